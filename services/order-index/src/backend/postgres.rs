//! PostgreSQL backend using SQLx
//!
//! Uses runtime query checking (no compile-time DATABASE_URL needed). Every
//! value is a bound parameter; the only text spliced into SQL comes from the
//! closed `relation`/`alias`/`ordering` functions below.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row as _, Transaction};
use tracing::{debug, info};

use super::row::{Row, RowCursor, Value};
use super::{AccessMode, Backend, BackendError, Query, Statement, UnitOfWork};
use crate::config::PostgresConfig;
use crate::index::{Attribute, Direction};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orderbook_pairs (
    token_bid BYTEA NOT NULL,
    token_ask BYTEA NOT NULL,
    PRIMARY KEY (token_bid, token_ask)
);

CREATE TABLE IF NOT EXISTS orderbook_orders (
    id        BYTEA PRIMARY KEY,
    maker_id  BYTEA NOT NULL,
    token_bid BYTEA NOT NULL,
    token_ask BYTEA NOT NULL,
    FOREIGN KEY (token_bid, token_ask)
        REFERENCES orderbook_pairs (token_bid, token_ask) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS orderbook_orders_maker_idx ON orderbook_orders (maker_id, id);
CREATE INDEX IF NOT EXISTS orderbook_orders_pair_idx ON orderbook_orders (token_bid, token_ask, id);

CREATE TABLE IF NOT EXISTS orderbook_rate (
    id        BYTEA PRIMARY KEY REFERENCES orderbook_orders (id) ON DELETE CASCADE,
    token_bid BYTEA NOT NULL,
    token_ask BYTEA NOT NULL,
    value     NUMERIC NOT NULL,
    FOREIGN KEY (token_bid, token_ask)
        REFERENCES orderbook_pairs (token_bid, token_ask) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS orderbook_rate_value_idx ON orderbook_rate (token_bid, token_ask, value, id);

CREATE TABLE IF NOT EXISTS orderbook_max_volume (
    id        BYTEA PRIMARY KEY REFERENCES orderbook_orders (id) ON DELETE CASCADE,
    token_bid BYTEA NOT NULL,
    token_ask BYTEA NOT NULL,
    value     NUMERIC NOT NULL,
    FOREIGN KEY (token_bid, token_ask)
        REFERENCES orderbook_pairs (token_bid, token_ask) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS orderbook_max_volume_value_idx ON orderbook_max_volume (token_bid, token_ask, value, id);

CREATE TABLE IF NOT EXISTS orderbook_min_volume (
    id        BYTEA PRIMARY KEY REFERENCES orderbook_orders (id) ON DELETE CASCADE,
    token_bid BYTEA NOT NULL,
    token_ask BYTEA NOT NULL,
    value     NUMERIC NOT NULL,
    FOREIGN KEY (token_bid, token_ask)
        REFERENCES orderbook_pairs (token_bid, token_ask) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS orderbook_min_volume_value_idx ON orderbook_min_volume (token_bid, token_ask, value, id);
"#;

/// Record joined with its three index values. Missing entries surface as NULLs.
const JOINED_SELECT: &str = r#"
SELECT o.id, o.maker_id, o.token_bid, o.token_ask, r.value, mx.value, mn.value
FROM orderbook_orders o
LEFT JOIN orderbook_rate r
    ON r.id = o.id AND r.token_bid = o.token_bid AND r.token_ask = o.token_ask
LEFT JOIN orderbook_max_volume mx
    ON mx.id = o.id AND mx.token_bid = o.token_bid AND mx.token_ask = o.token_ask
LEFT JOIN orderbook_min_volume mn
    ON mn.id = o.id AND mn.token_bid = o.token_bid AND mn.token_ask = o.token_ask
"#;

fn relation(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Rate => "orderbook_rate",
        Attribute::MaxVolume => "orderbook_max_volume",
        Attribute::MinVolume => "orderbook_min_volume",
    }
}

/// Table alias of an attribute within `JOINED_SELECT`
fn alias(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Rate => "r",
        Attribute::MaxVolume => "mx",
        Attribute::MinVolume => "mn",
    }
}

fn ordering(direction: Direction) -> &'static str {
    match direction {
        Direction::Ascending => "ASC",
        Direction::Descending => "DESC",
    }
}

/// `LIMIT NULL` is unlimited in PostgreSQL
fn sql_limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|n| i64::try_from(n).unwrap_or(i64::MAX))
}

fn sql_offset(offset: usize) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

/// Map a driver error onto the backend taxonomy by SQLSTATE
fn map_sqlx(err: sqlx::Error, timeout: Duration) -> BackendError {
    match &err {
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db.code().as_deref() {
                Some("40001") | Some("40P01") => BackendError::Conflict(message),
                Some("23505") => BackendError::UniqueViolation(message),
                Some("23503") => BackendError::MissingReference(message),
                Some("57014") => BackendError::Timeout(timeout),
                _ => BackendError::Unavailable(message),
            }
        }
        sqlx::Error::PoolTimedOut => BackendError::Timeout(timeout),
        sqlx::Error::PoolClosed => BackendError::Closed,
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. } => BackendError::Decode(err.to_string()),
        _ => BackendError::Unavailable(err.to_string()),
    }
}

/// Convert a driver row: `bytes` BYTEA columns followed by `decimals` NUMERIC columns
fn convert_row(row: &PgRow, bytes: usize, decimals: usize, timeout: Duration) -> Result<Row, BackendError> {
    let mut columns = Vec::with_capacity(bytes + decimals);
    for idx in 0..bytes {
        let value: Vec<u8> = row.try_get(idx).map_err(|e| map_sqlx(e, timeout))?;
        columns.push(Value::Bytes(value));
    }
    for idx in bytes..bytes + decimals {
        let value: Option<Decimal> = row.try_get(idx).map_err(|e| map_sqlx(e, timeout))?;
        let value = value.ok_or_else(|| BackendError::Decode(format!("column {idx} is NULL: index entry missing")))?;
        columns.push(Value::Decimal(value));
    }
    Ok(Row::new(columns))
}

// ── Backend ─────────────────────────────────────────────────────────

/// PostgreSQL backend. Clones share the pool.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    statement_timeout: Duration,
    closed: Arc<AtomicBool>,
}

impl PostgresBackend {
    /// Connect, then create the schema if it does not exist yet
    pub async fn connect(config: &PostgresConfig) -> Result<Self, BackendError> {
        let statement_timeout = config.statement_timeout();
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(statement_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx(e, statement_timeout))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| map_sqlx(e, statement_timeout))?;

        info!(
            max_connections = config.max_connections,
            statement_timeout_ms = config.statement_timeout_ms,
            "postgres pool established"
        );

        Ok(Self {
            pool,
            statement_timeout,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self, mode: AccessMode) -> Result<Box<dyn UnitOfWork>, BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }
        let timeout = self.statement_timeout;
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx(e, timeout))?;

        if mode == AccessMode::ReadOnly {
            sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx(e, timeout))?;
        }
        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(timeout.as_millis().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx(e, timeout))?;

        Ok(Box::new(PgUnitOfWork { tx, timeout }))
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        self.pool.close().await;
        info!("postgres pool closed");
        Ok(())
    }
}

// ── Unit of work ────────────────────────────────────────────────────

/// Dropping the transaction without commit rolls it back.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    timeout: Duration,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn execute(&mut self, statement: Statement) -> Result<u64, BackendError> {
        let timeout = self.timeout;
        let conn = &mut *self.tx;

        let result = match &statement {
            Statement::CreatePairIndexes { pair } => {
                sqlx::query(
                    "INSERT INTO orderbook_pairs (token_bid, token_ask) VALUES ($1, $2) ON CONFLICT DO NOTHING",
                )
                .bind(pair.token_bid.as_bytes())
                .bind(pair.token_ask.as_bytes())
                .execute(conn)
                .await
            }
            Statement::DropPairIndexes { pair } => {
                sqlx::query("DELETE FROM orderbook_pairs WHERE token_bid = $1 AND token_ask = $2")
                    .bind(pair.token_bid.as_bytes())
                    .bind(pair.token_ask.as_bytes())
                    .execute(conn)
                    .await
            }
            Statement::DeleteOrdersForPair { pair } => {
                sqlx::query("DELETE FROM orderbook_orders WHERE token_bid = $1 AND token_ask = $2")
                    .bind(pair.token_bid.as_bytes())
                    .bind(pair.token_ask.as_bytes())
                    .execute(conn)
                    .await
            }
            Statement::InsertOrderRecord { record } => {
                sqlx::query(
                    "INSERT INTO orderbook_orders (id, maker_id, token_bid, token_ask) VALUES ($1, $2, $3, $4)",
                )
                .bind(record.id.as_bytes())
                .bind(record.maker_id.as_bytes())
                .bind(record.token_bid.as_bytes())
                .bind(record.token_ask.as_bytes())
                .execute(conn)
                .await
            }
            Statement::InsertIndexEntry {
                pair,
                attribute,
                order_id,
                value,
            } => {
                let sql = format!(
                    "INSERT INTO {} (id, token_bid, token_ask, value) VALUES ($1, $2, $3, $4)",
                    relation(*attribute)
                );
                sqlx::query(&sql)
                    .bind(order_id.as_bytes())
                    .bind(pair.token_bid.as_bytes())
                    .bind(pair.token_ask.as_bytes())
                    .bind(*value)
                    .execute(conn)
                    .await
            }
            Statement::DeleteIndexEntry {
                pair,
                attribute,
                order_id,
            } => {
                let sql = format!(
                    "DELETE FROM {} WHERE id = $1 AND token_bid = $2 AND token_ask = $3",
                    relation(*attribute)
                );
                sqlx::query(&sql)
                    .bind(order_id.as_bytes())
                    .bind(pair.token_bid.as_bytes())
                    .bind(pair.token_ask.as_bytes())
                    .execute(conn)
                    .await
            }
            Statement::DeleteOrderRecord { order_id } => {
                sqlx::query("DELETE FROM orderbook_orders WHERE id = $1")
                    .bind(order_id.as_bytes())
                    .execute(conn)
                    .await
            }
        };

        let affected = result.map_err(|e| map_sqlx(e, timeout))?.rows_affected();
        debug!(kind = ?statement.kind(), affected, "statement executed");
        Ok(affected)
    }

    async fn query(&mut self, query: Query) -> Result<RowCursor, BackendError> {
        let timeout = self.timeout;
        let conn = &mut *self.tx;

        let (rows, bytes, decimals) = match &query {
            Query::PairExists { pair } => {
                let rows = sqlx::query(
                    "SELECT token_bid, token_ask FROM orderbook_pairs WHERE token_bid = $1 AND token_ask = $2",
                )
                .bind(pair.token_bid.as_bytes())
                .bind(pair.token_ask.as_bytes())
                .fetch_all(conn)
                .await;
                (rows, 2, 0)
            }
            Query::OrderRecord { order_id } => {
                let rows = sqlx::query("SELECT id, maker_id, token_bid, token_ask FROM orderbook_orders WHERE id = $1")
                    .bind(order_id.as_bytes())
                    .fetch_all(conn)
                    .await;
                (rows, 4, 0)
            }
            Query::OrderById { order_id, pair } => {
                let sql = format!("{JOINED_SELECT} WHERE o.id = $1 AND o.token_bid = $2 AND o.token_ask = $3");
                let rows = sqlx::query(&sql)
                    .bind(order_id.as_bytes())
                    .bind(pair.token_bid.as_bytes())
                    .bind(pair.token_ask.as_bytes())
                    .fetch_all(conn)
                    .await;
                (rows, 4, 3)
            }
            Query::OrdersByPair { pair, page } => {
                let sql = format!(
                    "{JOINED_SELECT} WHERE o.token_bid = $1 AND o.token_ask = $2 ORDER BY o.id ASC LIMIT $3 OFFSET $4"
                );
                let rows = sqlx::query(&sql)
                    .bind(pair.token_bid.as_bytes())
                    .bind(pair.token_ask.as_bytes())
                    .bind(sql_limit(page.limit))
                    .bind(sql_offset(page.skip()))
                    .fetch_all(conn)
                    .await;
                (rows, 4, 3)
            }
            Query::OrdersByMaker { maker_id, page } => {
                let sql = format!("{JOINED_SELECT} WHERE o.maker_id = $1 ORDER BY o.id ASC LIMIT $2 OFFSET $3");
                let rows = sqlx::query(&sql)
                    .bind(maker_id.as_bytes())
                    .bind(sql_limit(page.limit))
                    .bind(sql_offset(page.skip()))
                    .fetch_all(conn)
                    .await;
                (rows, 4, 3)
            }
            Query::Ranked {
                pair,
                attribute,
                direction,
                page,
            } => {
                let key = alias(*attribute);
                let sql = format!(
                    "{JOINED_SELECT} WHERE o.token_bid = $1 AND o.token_ask = $2 AND {key}.id IS NOT NULL \
                     ORDER BY {key}.value {}, o.id ASC LIMIT $3 OFFSET $4",
                    ordering(*direction)
                );
                let rows = sqlx::query(&sql)
                    .bind(pair.token_bid.as_bytes())
                    .bind(pair.token_ask.as_bytes())
                    .bind(sql_limit(page.limit))
                    .bind(sql_offset(page.skip()))
                    .fetch_all(conn)
                    .await;
                (rows, 4, 3)
            }
        };

        let rows = rows.map_err(|e| map_sqlx(e, timeout))?;
        let converted = rows
            .iter()
            .map(|row| convert_row(row, bytes, decimals, timeout))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RowCursor::new(converted))
    }

    async fn commit(self: Box<Self>) -> Result<(), BackendError> {
        let timeout = self.timeout;
        self.tx.commit().await.map_err(|e| map_sqlx(e, timeout))
    }

    async fn rollback(self: Box<Self>) -> Result<(), BackendError> {
        let timeout = self.timeout;
        self.tx.rollback().await.map_err(|e| map_sqlx(e, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_names_are_closed() {
        let names: Vec<_> = Attribute::ALL.iter().map(|a| relation(*a)).collect();
        assert_eq!(names, vec!["orderbook_rate", "orderbook_max_volume", "orderbook_min_volume"]);
        for attribute in Attribute::ALL {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {}", relation(attribute))));
        }
    }

    #[test]
    fn test_unrestricted_limit_is_null() {
        assert_eq!(sql_limit(None), None);
        assert_eq!(sql_limit(Some(3)), Some(3));
        assert_eq!(sql_offset(usize::MAX), i64::MAX);
    }

    #[test]
    fn test_pool_errors_map() {
        let timeout = Duration::from_millis(10);
        assert_eq!(map_sqlx(sqlx::Error::PoolClosed, timeout), BackendError::Closed);
        assert_eq!(map_sqlx(sqlx::Error::PoolTimedOut, timeout), BackendError::Timeout(timeout));
        assert!(matches!(
            map_sqlx(sqlx::Error::RowNotFound, timeout),
            BackendError::Unavailable(_)
        ));
    }
}
