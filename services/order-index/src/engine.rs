//! Order index engine core
//!
//! Owns the backend handle and the unit-of-work plumbing shared by the
//! registry, mutation and query operations.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::{AccessMode, Backend, MemoryBackend, UnitOfWork};
use crate::config::{BackendConfig, EngineConfig};
use crate::error::{BackendResultExt, EngineResult};

/// Order index handle
///
/// Cheap to clone; every clone shares one backend. Each public operation
/// runs in its own unit of work, so the handle carries no session state.
#[derive(Clone)]
pub struct OrderIndex {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for OrderIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderIndex").field("backend", &self.backend.name()).finish()
    }
}

impl OrderIndex {
    pub fn new<B: Backend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_shared(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Build the configured backend
    pub async fn open(config: &EngineConfig) -> EngineResult<Self> {
        let index = match &config.backend {
            BackendConfig::Memory(memory) => Self::new(MemoryBackend::with_lock_timeout(memory.lock_timeout())),
            #[cfg(feature = "postgres")]
            BackendConfig::Postgres(postgres) => {
                let backend = crate::backend::PostgresBackend::connect(postgres)
                    .await
                    .context("connecting to postgres")?;
                Self::new(backend)
            }
            #[cfg(not(feature = "postgres"))]
            BackendConfig::Postgres(_) => {
                return Err(crate::error::EngineError::backend(
                    "opening backend",
                    crate::backend::BackendError::Unavailable("built without the `postgres` feature".into()),
                ))
            }
        };
        info!(backend = index.backend_name(), "order index opened");
        Ok(index)
    }

    /// Release the backend. Operations on any clone fail afterwards.
    pub async fn close(&self) -> EngineResult<()> {
        self.backend.close().await.context("closing backend")?;
        info!(backend = self.backend_name(), "order index closed");
        Ok(())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub(crate) async fn begin(&self, mode: AccessMode, context: &'static str) -> EngineResult<Box<dyn UnitOfWork>> {
        self.backend.begin(mode).await.context(context)
    }

    /// Commit on success, roll back on failure.
    ///
    /// The caller's error is returned even if the rollback itself fails.
    pub(crate) async fn finish<T>(
        &self,
        uow: Box<dyn UnitOfWork>,
        result: EngineResult<T>,
        operation: &'static str,
    ) -> EngineResult<T> {
        match result {
            Ok(value) => {
                uow.commit().await.context("committing unit of work")?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(operation, error = %err, %rollback_err, "rollback failed");
                } else {
                    warn!(operation, error = %err, "rolled back");
                }
                Err(err)
            }
        }
    }
}
