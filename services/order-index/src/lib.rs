//! Order Index Service
//!
//! Storage engine for limit orders on token pairs. Every order lives in a
//! canonical record store and in three per-pair ordered indexes (rate, max
//! volume, min volume), kept in lockstep through a transactional backend.
//!
//! **Key Invariants:**
//! - An order on a pair has exactly one entry in each of that pair's indexes
//! - (A, B) and (B, A) are distinct index spaces, provisioned together
//! - Mutations are atomic; a failed call leaves no partial state
//! - Ties in any ordering are broken by smallest order id
//!
//! ```no_run
//! # async fn demo() -> Result<(), order_index::EngineError> {
//! use order_index::{EngineConfig, OrderIndex};
//! use types::ids::TokenId;
//! use types::page::Page;
//!
//! let config = EngineConfig::default();
//! config.init_tracing();
//! let index = OrderIndex::open(&config).await?;
//! let (eth, usdc) = (TokenId::from("ETH"), TokenId::from("USDC"));
//! index.add_pair(&eth, &usdc).await?;
//! let best = index.list_max_rate_orders(&eth, &usdc, Page::first(10)).await?;
//! # let _ = best;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod orders;
pub mod query;
pub mod registry;
pub mod telemetry;

pub use backend::{AccessMode, Backend, BackendError, MemoryBackend, UnitOfWork};
#[cfg(feature = "postgres")]
pub use backend::PostgresBackend;
pub use config::{BackendConfig, EngineConfig};
pub use engine::OrderIndex;
pub use error::{EngineError, EngineResult};
pub use index::{Attribute, Direction};
