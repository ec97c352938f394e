//! Single-attribute ordered index
//!
//! Maps each attribute value to the set of order ids holding it, plus a
//! reverse id -> value map for O(log n) deletes and point lookups.
//! Uses BTreeMap/BTreeSet throughout so iteration is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use types::ids::OrderId;

use super::Direction;

/// Ordered index over one attribute of the orders of a directional pair.
///
/// Entries hold only the order id and the indexed value; the order itself
/// lives in the record store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeIndex {
    /// Value levels sorted ascending; ids within a level sorted ascending
    levels: BTreeMap<Decimal, BTreeSet<OrderId>>,
    /// Exact value inserted for each id
    by_id: BTreeMap<OrderId, Decimal>,
}

impl AttributeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry.
    ///
    /// Returns false (and changes nothing) if the id is already indexed.
    pub fn insert(&mut self, order_id: OrderId, value: Decimal) -> bool {
        if self.by_id.contains_key(&order_id) {
            return false;
        }
        self.levels.entry(value).or_default().insert(order_id.clone());
        self.by_id.insert(order_id, value);
        true
    }

    /// Remove an entry, returning the value it was indexed under
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Decimal> {
        let value = self.by_id.remove(order_id)?;
        if let Some(level) = self.levels.get_mut(&value) {
            level.remove(order_id);
            // Drop empty levels to keep min/max O(log n)
            if level.is_empty() {
                self.levels.remove(&value);
            }
        }
        Some(value)
    }

    pub fn value_of(&self, order_id: &OrderId) -> Option<Decimal> {
        self.by_id.get(order_id).copied()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.by_id.contains_key(order_id)
    }

    /// Smallest value; the smallest id among ties
    pub fn min(&self) -> Option<(&OrderId, Decimal)> {
        self.iter(Direction::Ascending).next()
    }

    /// Largest value; the smallest id among ties
    pub fn max(&self) -> Option<(&OrderId, Decimal)> {
        self.iter(Direction::Descending).next()
    }

    /// Entries in value order. Within one value, ids ascend in both directions.
    pub fn iter(&self, direction: Direction) -> Box<dyn Iterator<Item = (&OrderId, Decimal)> + '_> {
        match direction {
            Direction::Ascending => Box::new(self.levels.iter().flat_map(move |(value, ids)| {
                ids.iter().map(move |id| (id, self.exact(id).unwrap_or(*value)))
            })),
            Direction::Descending => Box::new(self.levels.iter().rev().flat_map(move |(value, ids)| {
                ids.iter().map(move |id| (id, self.exact(id).unwrap_or(*value)))
            })),
        }
    }

    /// Indexed ids in ascending id order
    pub fn ids(&self) -> impl Iterator<Item = &OrderId> + '_ {
        self.by_id.keys()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Number of distinct values
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    // The level key keeps the scale of the first insert; report each id's own.
    fn exact(&self, order_id: &OrderId) -> Option<Decimal> {
        self.by_id.get(order_id).copied()
    }
}
