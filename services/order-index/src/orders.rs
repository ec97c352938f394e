//! Order mutations
//!
//! An order exists as one canonical record plus one entry in each of its
//! pair's three indexes. Both operations touch all four in a single unit of
//! work, so a failure at any step leaves no trace.

use tracing::debug;
use types::ids::OrderId;
use types::order::{Order, OrderRecord};

use crate::backend::row::decode_record;
use crate::backend::{AccessMode, BackendError, Query, Statement, UnitOfWork};
use crate::engine::OrderIndex;
use crate::error::{BackendResultExt, EngineError, EngineResult};
use crate::index::Attribute;
use crate::registry::pair_exists;

fn insert_context(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Rate => "inserting order into rate index",
        Attribute::MaxVolume => "inserting order into max volume index",
        Attribute::MinVolume => "inserting order into min volume index",
    }
}

fn delete_context(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Rate => "deleting order from rate index",
        Attribute::MaxVolume => "deleting order from max volume index",
        Attribute::MinVolume => "deleting order from min volume index",
    }
}

/// Canonical record for `order_id`, if any
pub(crate) async fn find_record(uow: &mut dyn UnitOfWork, order_id: &OrderId) -> EngineResult<Option<OrderRecord>> {
    let mut rows = uow
        .query(Query::OrderRecord {
            order_id: order_id.clone(),
        })
        .await
        .context("looking up order record")?;
    rows.next()
        .map(|row| decode_record(&row))
        .transpose()
        .context("decoding order record")
}

async fn insert(uow: &mut dyn UnitOfWork, order: &Order) -> EngineResult<()> {
    if find_record(uow, &order.id).await?.is_some() {
        return Err(EngineError::DuplicateOrder {
            order_id: order.id.clone(),
        });
    }
    let pair = order.pair();
    if !pair_exists(uow, &pair).await? {
        return Err(EngineError::PairNotFound { pair });
    }

    uow.execute(Statement::InsertOrderRecord { record: order.record() })
        .await
        .map_err(|err| match err {
            BackendError::UniqueViolation(_) => EngineError::DuplicateOrder {
                order_id: order.id.clone(),
            },
            BackendError::MissingReference(_) => EngineError::PairNotFound { pair: pair.clone() },
            other => EngineError::backend("inserting order record", other),
        })?;

    for attribute in Attribute::ALL {
        uow.execute(Statement::InsertIndexEntry {
            pair: pair.clone(),
            attribute,
            order_id: order.id.clone(),
            value: attribute.value_of(order),
        })
        .await
        .map_err(|err| match err {
            BackendError::MissingReference(_) => EngineError::PairNotFound { pair: pair.clone() },
            other => EngineError::backend(insert_context(attribute), other),
        })?;
    }
    Ok(())
}

async fn delete(uow: &mut dyn UnitOfWork, order_id: &OrderId) -> EngineResult<OrderRecord> {
    let record = find_record(uow, order_id).await?.ok_or_else(|| EngineError::OrderNotFound {
        order_id: order_id.clone(),
    })?;
    let pair = record.pair();

    for attribute in Attribute::ALL {
        uow.execute(Statement::DeleteIndexEntry {
            pair: pair.clone(),
            attribute,
            order_id: order_id.clone(),
        })
        .await
        .context(delete_context(attribute))?;
    }

    let deleted = uow
        .execute(Statement::DeleteOrderRecord {
            order_id: order_id.clone(),
        })
        .await
        .context("deleting order record")?;
    // A concurrent remover got there first
    if deleted == 0 {
        return Err(EngineError::OrderNotFound {
            order_id: order_id.clone(),
        });
    }
    Ok(record)
}

impl OrderIndex {
    /// Insert an order into the record store and its pair's three indexes
    pub async fn add_order(&self, order: &Order) -> EngineResult<()> {
        order.validate()?;
        let mut uow = self.begin(AccessMode::ReadWrite, "beginning add_order").await?;
        let result = insert(uow.as_mut(), order).await;
        self.finish(uow, result, "add_order").await?;

        debug!(
            order_id = %order.id,
            pair = %order.pair(),
            rate = %order.rate,
            "order added"
        );
        Ok(())
    }

    /// Delete an order's record and every index entry referencing it
    pub async fn remove_order(&self, order_id: &OrderId) -> EngineResult<()> {
        let mut uow = self.begin(AccessMode::ReadWrite, "beginning remove_order").await?;
        let result = delete(uow.as_mut(), order_id).await;
        let record = self.finish(uow, result, "remove_order").await?;

        debug!(order_id = %order_id, pair = %record.pair(), "order removed");
        Ok(())
    }
}
