//! Persistence backend contract
//!
//! The engine talks to storage only through a unit of work: begin, execute
//! mutating statements, run queries returning a row cursor, then commit or
//! roll back. Statements and queries are closed enums carrying typed
//! parameters; a backend never receives caller data as query text.
//!
//! Backends:
//! - `memory`: in-process tables with an undo log (default)
//! - `postgres`: sqlx over PostgreSQL (feature `postgres`)

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod row;

pub use memory::MemoryBackend;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use row::{Row, RowCursor, Value};

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;
use types::ids::{DirectionalPair, MakerId, OrderId};
use types::order::OrderRecord;
use types::page::Page;

use crate::index::{Attribute, Direction};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("concurrent write conflict: {0}")]
    Conflict(String),

    #[error("unique key violation: {0}")]
    UniqueViolation(String),

    #[error("missing reference: {0}")]
    MissingReference(String),

    #[error("malformed row: {0}")]
    Decode(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("statement issued in a read-only unit of work")]
    ReadOnly,

    #[error("backend closed")]
    Closed,
}

// ── Statements & queries ────────────────────────────────────────────

/// Isolation requested for a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Queries only. Sees committed state, never a half-applied write.
    ReadOnly,
    /// Statements and queries; excludes other writers on touched rows.
    ReadWrite,
}

/// Mutating statement. Each returns the number of rows it affected.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Register a directional pair and provision its three indexes. No-op if present.
    CreatePairIndexes { pair: DirectionalPair },
    /// Drop a directional pair's indexes and every entry in them.
    DropPairIndexes { pair: DirectionalPair },
    /// Delete the canonical records of every order on a directional pair.
    DeleteOrdersForPair { pair: DirectionalPair },
    InsertOrderRecord { record: OrderRecord },
    InsertIndexEntry {
        pair: DirectionalPair,
        attribute: Attribute,
        order_id: OrderId,
        value: Decimal,
    },
    DeleteIndexEntry {
        pair: DirectionalPair,
        attribute: Attribute,
        order_id: OrderId,
    },
    /// Delete a canonical record; its index entries cascade.
    DeleteOrderRecord { order_id: OrderId },
}

/// Statement discriminant, used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    CreatePairIndexes,
    DropPairIndexes,
    DeleteOrdersForPair,
    InsertOrderRecord,
    InsertIndexEntry(Attribute),
    DeleteIndexEntry(Attribute),
    DeleteOrderRecord,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::CreatePairIndexes { .. } => StatementKind::CreatePairIndexes,
            Statement::DropPairIndexes { .. } => StatementKind::DropPairIndexes,
            Statement::DeleteOrdersForPair { .. } => StatementKind::DeleteOrdersForPair,
            Statement::InsertOrderRecord { .. } => StatementKind::InsertOrderRecord,
            Statement::InsertIndexEntry { attribute, .. } => StatementKind::InsertIndexEntry(*attribute),
            Statement::DeleteIndexEntry { attribute, .. } => StatementKind::DeleteIndexEntry(*attribute),
            Statement::DeleteOrderRecord { .. } => StatementKind::DeleteOrderRecord,
        }
    }
}

/// Read query and the row shape it yields.
///
/// Joined rows have seven columns:
/// `id, maker_id, token_bid, token_ask, rate, max_volume, min_volume`.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// One row `token_bid, token_ask` if registered, none otherwise
    PairExists { pair: DirectionalPair },
    /// One row `id, maker_id, token_bid, token_ask` if the record exists
    OrderRecord { order_id: OrderId },
    /// One joined row if the order exists on that pair
    OrderById { order_id: OrderId, pair: DirectionalPair },
    /// Joined rows, id ascending
    OrdersByPair { pair: DirectionalPair, page: Page },
    /// Joined rows across all pairs, id ascending
    OrdersByMaker { maker_id: MakerId, page: Page },
    /// Joined rows sorted on one attribute, ties by id ascending
    Ranked {
        pair: DirectionalPair,
        attribute: Attribute,
        direction: Direction,
        page: Page,
    },
}

// ── Traits ──────────────────────────────────────────────────────────

/// Source of units of work. Shared by every concurrent caller.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn begin(&self, mode: AccessMode) -> Result<Box<dyn UnitOfWork>, BackendError>;

    /// Release resources. Later `begin` calls fail with `Closed`.
    async fn close(&self) -> Result<(), BackendError>;
}

/// Atomic group of statements and queries.
///
/// Dropping a unit of work without committing rolls it back.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn execute(&mut self, statement: Statement) -> Result<u64, BackendError>;

    async fn query(&mut self, query: Query) -> Result<RowCursor, BackendError>;

    async fn commit(self: Box<Self>) -> Result<(), BackendError>;

    async fn rollback(self: Box<Self>) -> Result<(), BackendError>;
}
