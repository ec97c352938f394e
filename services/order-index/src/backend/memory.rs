//! In-process backend
//!
//! Tables live behind one async RwLock. A read-write unit of work holds the
//! write guard for its whole lifetime and records an undo entry for every
//! change; rollback (explicit, or by drop) replays the undo log in reverse.
//! Readers share the read guard and therefore only ever see committed state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, trace, warn};
use types::ids::{DirectionalPair, MakerId, OrderId};
use types::order::OrderRecord;

use super::row::{Row, RowCursor};
use super::{AccessMode, Backend, BackendError, Query, Statement, StatementKind, UnitOfWork};
use crate::index::{Attribute, PairIndexSet};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5_000);

// ── Tables ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    /// Canonical records keyed by id
    orders: BTreeMap<OrderId, OrderRecord>,
    /// Secondary index on maker, ordered by (maker, id)
    by_maker: BTreeSet<(MakerId, OrderId)>,
    /// Provisioned directional pairs and their indexes
    pairs: HashMap<DirectionalPair, PairIndexSet>,
}

/// Inverse of one applied change
#[derive(Debug)]
enum Undo {
    RemoveRecord(OrderId),
    RestoreRecord(OrderRecord),
    RemoveEntry {
        pair: DirectionalPair,
        attribute: Attribute,
        order_id: OrderId,
    },
    RestoreEntry {
        pair: DirectionalPair,
        attribute: Attribute,
        order_id: OrderId,
        value: Decimal,
    },
    DropPair(DirectionalPair),
    RestorePair(DirectionalPair, PairIndexSet),
}

impl Tables {
    fn insert_record(&mut self, record: OrderRecord) {
        self.by_maker.insert((record.maker_id.clone(), record.id.clone()));
        self.orders.insert(record.id.clone(), record);
    }

    fn remove_record(&mut self, order_id: &OrderId) -> Option<OrderRecord> {
        let record = self.orders.remove(order_id)?;
        self.by_maker.remove(&(record.maker_id.clone(), record.id.clone()));
        Some(record)
    }

    /// Remove an order's entries from a pair's indexes, logging each for undo
    fn cascade_entries(&mut self, pair: &DirectionalPair, order_id: &OrderId, undo: &mut Vec<Undo>) {
        let Some(set) = self.pairs.get_mut(pair) else {
            return;
        };
        for (attribute, value) in set.remove_all(order_id) {
            if let Some(value) = value {
                undo.push(Undo::RestoreEntry {
                    pair: pair.clone(),
                    attribute,
                    order_id: order_id.clone(),
                    value,
                });
            }
        }
    }

    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveRecord(order_id) => {
                self.remove_record(&order_id);
            }
            Undo::RestoreRecord(record) => self.insert_record(record),
            Undo::RemoveEntry {
                pair,
                attribute,
                order_id,
            } => {
                if let Some(set) = self.pairs.get_mut(&pair) {
                    set.index_mut(attribute).remove(&order_id);
                }
            }
            Undo::RestoreEntry {
                pair,
                attribute,
                order_id,
                value,
            } => {
                if let Some(set) = self.pairs.get_mut(&pair) {
                    set.index_mut(attribute).insert(order_id, value);
                }
            }
            Undo::DropPair(pair) => {
                self.pairs.remove(&pair);
            }
            Undo::RestorePair(pair, set) => {
                self.pairs.insert(pair, set);
            }
        }
    }

    fn apply(&mut self, statement: Statement, undo: &mut Vec<Undo>) -> Result<u64, BackendError> {
        match statement {
            Statement::CreatePairIndexes { pair } => {
                if self.pairs.contains_key(&pair) {
                    return Ok(0);
                }
                self.pairs.insert(pair.clone(), PairIndexSet::new());
                undo.push(Undo::DropPair(pair));
                Ok(1)
            }

            Statement::DropPairIndexes { pair } => match self.pairs.remove(&pair) {
                Some(set) => {
                    undo.push(Undo::RestorePair(pair, set));
                    Ok(1)
                }
                None => Ok(0),
            },

            Statement::DeleteOrdersForPair { pair } => {
                let members: Vec<OrderId> = match self.pairs.get(&pair) {
                    Some(set) => set.member_ids().cloned().collect(),
                    None => return Ok(0),
                };
                let mut deleted = 0;
                for order_id in members {
                    self.cascade_entries(&pair, &order_id, undo);
                    if let Some(record) = self.remove_record(&order_id) {
                        undo.push(Undo::RestoreRecord(record));
                        deleted += 1;
                    }
                }
                Ok(deleted)
            }

            Statement::InsertOrderRecord { record } => {
                if self.orders.contains_key(&record.id) {
                    return Err(BackendError::UniqueViolation(format!("order {}", record.id)));
                }
                let pair = record.pair();
                if !self.pairs.contains_key(&pair) {
                    return Err(BackendError::MissingReference(format!("pair {pair}")));
                }
                undo.push(Undo::RemoveRecord(record.id.clone()));
                self.insert_record(record);
                Ok(1)
            }

            Statement::InsertIndexEntry {
                pair,
                attribute,
                order_id,
                value,
            } => {
                if !self.orders.contains_key(&order_id) {
                    return Err(BackendError::MissingReference(format!("order {order_id}")));
                }
                let set = self
                    .pairs
                    .get_mut(&pair)
                    .ok_or_else(|| BackendError::MissingReference(format!("pair {pair}")))?;
                if !set.index_mut(attribute).insert(order_id.clone(), value) {
                    return Err(BackendError::UniqueViolation(format!(
                        "order {order_id} in {attribute} index of {pair}"
                    )));
                }
                undo.push(Undo::RemoveEntry {
                    pair,
                    attribute,
                    order_id,
                });
                Ok(1)
            }

            Statement::DeleteIndexEntry {
                pair,
                attribute,
                order_id,
            } => {
                let removed = self
                    .pairs
                    .get_mut(&pair)
                    .and_then(|set| set.index_mut(attribute).remove(&order_id));
                match removed {
                    Some(value) => {
                        undo.push(Undo::RestoreEntry {
                            pair,
                            attribute,
                            order_id,
                            value,
                        });
                        Ok(1)
                    }
                    None => Ok(0),
                }
            }

            Statement::DeleteOrderRecord { order_id } => {
                let Some(record) = self.remove_record(&order_id) else {
                    return Ok(0);
                };
                let pair = record.pair();
                undo.push(Undo::RestoreRecord(record));
                self.cascade_entries(&pair, &order_id, undo);
                Ok(1)
            }
        }
    }

    /// Join a record with its index entries on `pair`
    fn joined_row(&self, pair: &DirectionalPair, order_id: &OrderId) -> Result<Row, BackendError> {
        let record = self
            .orders
            .get(order_id)
            .ok_or_else(|| BackendError::Decode(format!("index entry {order_id} on {pair} has no record")))?;
        let attributes = self
            .pairs
            .get(pair)
            .and_then(|set| set.attributes_of(order_id))
            .ok_or_else(|| BackendError::Decode(format!("order {order_id} is missing index entries on {pair}")))?;
        Ok(Row::joined(record, attributes))
    }

    fn run(&self, query: Query) -> Result<RowCursor, BackendError> {
        let rows = match query {
            Query::PairExists { pair } => {
                if self.pairs.contains_key(&pair) {
                    vec![Row::new(vec![
                        super::Value::Bytes(pair.token_bid.as_bytes().to_vec()),
                        super::Value::Bytes(pair.token_ask.as_bytes().to_vec()),
                    ])]
                } else {
                    Vec::new()
                }
            }

            Query::OrderRecord { order_id } => self.orders.get(&order_id).map(Row::from_record).into_iter().collect(),

            Query::OrderById { order_id, pair } => match self.orders.get(&order_id) {
                Some(record) if record.pair() == pair => vec![self.joined_row(&pair, &order_id)?],
                _ => Vec::new(),
            },

            Query::OrdersByPair { pair, page } => match self.pairs.get(&pair) {
                Some(set) => page
                    .apply(set.member_ids())
                    .map(|order_id| self.joined_row(&pair, order_id))
                    .collect::<Result<_, _>>()?,
                None => Vec::new(),
            },

            Query::OrdersByMaker { maker_id, page } => {
                let start = (maker_id.clone(), OrderId::from_bytes(Vec::new()));
                let owned = self
                    .by_maker
                    .range(start..)
                    .take_while(|(maker, _)| *maker == maker_id)
                    .map(|(_, order_id)| order_id);
                page.apply(owned)
                    .map(|order_id| {
                        let pair = self
                            .orders
                            .get(order_id)
                            .map(OrderRecord::pair)
                            .ok_or_else(|| BackendError::Decode(format!("maker entry {order_id} has no record")))?;
                        self.joined_row(&pair, order_id)
                    })
                    .collect::<Result<_, _>>()?
            }

            Query::Ranked {
                pair,
                attribute,
                direction,
                page,
            } => match self.pairs.get(&pair) {
                Some(set) => page
                    .apply(set.index(attribute).iter(direction))
                    .map(|(order_id, _)| self.joined_row(&pair, order_id))
                    .collect::<Result<_, _>>()?,
                None => Vec::new(),
            },
        };
        Ok(RowCursor::new(rows))
    }

    fn violations(&self) -> Vec<String> {
        let mut found = Vec::new();
        for (pair, set) in &self.pairs {
            if !set.is_synchronized() {
                found.push(format!("indexes of {pair} hold different order sets"));
            }
            for order_id in set.member_ids() {
                match self.orders.get(order_id) {
                    None => found.push(format!("{pair} indexes {order_id} without a record")),
                    Some(record) if record.pair() != *pair => {
                        found.push(format!("{pair} indexes {order_id} which belongs to {}", record.pair()))
                    }
                    Some(_) => {}
                }
            }
        }
        for (order_id, record) in &self.orders {
            let pair = record.pair();
            match self.pairs.get(&pair) {
                None => found.push(format!("order {order_id} references unregistered pair {pair}")),
                Some(set) if set.attributes_of(order_id).is_none() => {
                    found.push(format!("order {order_id} is missing from the indexes of {pair}"))
                }
                Some(_) => {}
            }
            if !self.by_maker.contains(&(record.maker_id.clone(), order_id.clone())) {
                found.push(format!("order {order_id} missing from maker index"));
            }
        }
        if self.by_maker.len() != self.orders.len() {
            found.push(format!(
                "maker index holds {} entries for {} orders",
                self.by_maker.len(),
                self.orders.len()
            ));
        }
        found
    }
}

// ── Fault injection ─────────────────────────────────────────────────

#[derive(Debug)]
struct Fault {
    kind: StatementKind,
    skip: usize,
    error: BackendError,
}

// ── Backend ─────────────────────────────────────────────────────────

/// In-memory backend. Clones share the same tables.
#[derive(Clone)]
pub struct MemoryBackend {
    tables: Arc<RwLock<Tables>>,
    lock_timeout: Duration,
    faults: Arc<Mutex<Vec<Fault>>>,
    closed: Arc<AtomicBool>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    /// `lock_timeout` bounds how long `begin` waits for the table lock
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            lock_timeout,
            faults: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Fail the next statement of `kind` with `error`
    pub fn inject_fault(&self, kind: StatementKind, error: BackendError) {
        self.inject_fault_after(kind, 0, error);
    }

    /// Let `skip` statements of `kind` through, then fail the next one
    pub fn inject_fault_after(&self, kind: StatementKind, skip: usize, error: BackendError) {
        self.faults.lock().push(Fault { kind, skip, error });
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Cross-table invariant violations in committed state; empty when consistent
    pub async fn consistency_violations(&self) -> Vec<String> {
        self.tables.read().await.violations()
    }

    pub async fn verify_consistency(&self) -> Result<(), String> {
        let violations = self.consistency_violations().await;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join("; "))
        }
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn pair_count(&self) -> usize {
        self.tables.read().await.pairs.len()
    }

    fn take_fault(&self, kind: StatementKind) -> Option<BackendError> {
        let mut faults = self.faults.lock();
        let pos = faults.iter().position(|f| f.kind == kind)?;
        if faults[pos].skip > 0 {
            faults[pos].skip -= 1;
            return None;
        }
        Some(faults.remove(pos).error)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self, mode: AccessMode) -> Result<Box<dyn UnitOfWork>, BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }
        let guard = match mode {
            AccessMode::ReadOnly => tokio::time::timeout(self.lock_timeout, self.tables.clone().read_owned())
                .await
                .map(Guard::Read),
            AccessMode::ReadWrite => tokio::time::timeout(self.lock_timeout, self.tables.clone().write_owned())
                .await
                .map(Guard::Write),
        }
        .map_err(|_| BackendError::Timeout(self.lock_timeout))?;
        trace!(?mode, "memory unit of work started");

        Ok(Box::new(MemoryUnitOfWork {
            guard,
            undo: Vec::new(),
            finished: false,
            backend: self.clone(),
        }))
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        debug!("memory backend closed");
        Ok(())
    }
}

// ── Unit of work ────────────────────────────────────────────────────

enum Guard {
    Read(OwnedRwLockReadGuard<Tables>),
    Write(OwnedRwLockWriteGuard<Tables>),
}

struct MemoryUnitOfWork {
    guard: Guard,
    undo: Vec<Undo>,
    finished: bool,
    backend: MemoryBackend,
}

impl MemoryUnitOfWork {
    fn tables(&self) -> &Tables {
        match &self.guard {
            Guard::Read(tables) => &**tables,
            Guard::Write(tables) => &**tables,
        }
    }

    fn revert_all(&mut self) -> usize {
        let Guard::Write(tables) = &mut self.guard else {
            return 0;
        };
        let reverted = self.undo.len();
        for undo in self.undo.drain(..).rev() {
            tables.revert(undo);
        }
        reverted
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn execute(&mut self, statement: Statement) -> Result<u64, BackendError> {
        let Guard::Write(tables) = &mut self.guard else {
            return Err(BackendError::ReadOnly);
        };
        if let Some(error) = self.backend.take_fault(statement.kind()) {
            debug!(kind = ?statement.kind(), %error, "injected fault fired");
            return Err(error);
        }
        tables.apply(statement, &mut self.undo)
    }

    async fn query(&mut self, query: Query) -> Result<RowCursor, BackendError> {
        self.tables().run(query)
    }

    async fn commit(self: Box<Self>) -> Result<(), BackendError> {
        let mut this = self;
        this.undo.clear();
        this.finished = true;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), BackendError> {
        let mut this = self;
        let reverted = this.revert_all();
        this.finished = true;
        trace!(reverted, "memory unit of work rolled back");
        Ok(())
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let reverted = self.revert_all();
        if reverted > 0 {
            warn!(reverted, "unit of work dropped before commit, changes reverted");
        }
    }
}
