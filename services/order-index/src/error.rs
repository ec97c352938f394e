//! Engine error taxonomy
//!
//! Every public operation returns `EngineError`. Backend failures carry a
//! static context naming the step that failed; everything else names the
//! entity the caller referred to.

use thiserror::Error;
use types::errors::{OrderError, PageError};
use types::ids::{DirectionalPair, OrderId};

use crate::backend::BackendError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid order: {0}")]
    InvalidOrder(#[from] OrderError),

    #[error("invalid pair {pair}: {reason}")]
    InvalidPair { pair: DirectionalPair, reason: &'static str },

    #[error("invalid page: {0}")]
    InvalidPage(#[from] PageError),

    #[error("order {order_id} already exists")]
    DuplicateOrder { order_id: OrderId },

    #[error("order {order_id} not found")]
    OrderNotFound { order_id: OrderId },

    #[error("pair {pair} is not registered")]
    PairNotFound { pair: DirectionalPair },

    #[error("no orders for pair {pair}")]
    NoOrdersForPair { pair: DirectionalPair },

    #[error("backend unavailable while {context}: {source}")]
    BackendUnavailable {
        context: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("write conflict while {context}: {source}")]
    BackendConflict {
        context: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("undecodable data while {context}: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: BackendError,
    },
}

impl EngineError {
    /// Classify a backend failure raised during `context`
    pub fn backend(context: &'static str, source: BackendError) -> Self {
        match source {
            BackendError::Conflict(_) | BackendError::UniqueViolation(_) => EngineError::BackendConflict { context, source },
            BackendError::Decode(_) => EngineError::Decode { context, source },
            BackendError::Unavailable(_)
            | BackendError::MissingReference(_)
            | BackendError::Timeout(_)
            | BackendError::ReadOnly
            | BackendError::Closed => EngineError::BackendUnavailable { context, source },
        }
    }

    /// Whether the same call may succeed if simply retried
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::BackendConflict { .. } => true,
            EngineError::BackendUnavailable { source, .. } => {
                matches!(source, BackendError::Unavailable(_) | BackendError::Timeout(_))
            }
            _ => false,
        }
    }

    /// Caller-side mistake, as opposed to a storage failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidOrder(_)
                | EngineError::InvalidPair { .. }
                | EngineError::InvalidPage(_)
                | EngineError::DuplicateOrder { .. }
                | EngineError::OrderNotFound { .. }
                | EngineError::PairNotFound { .. }
                | EngineError::NoOrdersForPair { .. }
        )
    }
}

pub(crate) trait BackendResultExt<T> {
    fn context(self, context: &'static str) -> EngineResult<T>;
}

impl<T> BackendResultExt<T> for Result<T, BackendError> {
    fn context(self, context: &'static str) -> EngineResult<T> {
        self.map_err(|err| EngineError::backend(context, err))
    }
}
