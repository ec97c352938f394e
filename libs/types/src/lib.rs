//! Types library for the order index storage engine
//!
//! Shared domain types used by the engine and by any service built on it.
//!
//! # Modules
//! - `ids`: Opaque byte-string identifiers (OrderId, MakerId, TokenId) and directional pairs
//! - `numeric`: Fixed-point decimal types (Rate, Volume)
//! - `order`: Order and canonical record types, input validation
//! - `page`: Pagination window with the `-1` sentinel convention
//! - `errors`: Validation error taxonomy

pub mod ids;
pub mod numeric;
pub mod order;
pub mod page;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::page::*;
    pub use crate::errors::*;
}
