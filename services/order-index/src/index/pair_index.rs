//! Index set for one directional pair
//!
//! Three synchronized indexes (rate, max volume, min volume) over the same
//! set of order ids.

use rust_decimal::Decimal;
use types::ids::OrderId;

use super::{Attribute, AttributeIndex};

/// The three indexes provisioned for a directional pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairIndexSet {
    rate: AttributeIndex,
    max_volume: AttributeIndex,
    min_volume: AttributeIndex,
}

impl PairIndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&self, attribute: Attribute) -> &AttributeIndex {
        match attribute {
            Attribute::Rate => &self.rate,
            Attribute::MaxVolume => &self.max_volume,
            Attribute::MinVolume => &self.min_volume,
        }
    }

    pub fn index_mut(&mut self, attribute: Attribute) -> &mut AttributeIndex {
        match attribute {
            Attribute::Rate => &mut self.rate,
            Attribute::MaxVolume => &mut self.max_volume,
            Attribute::MinVolume => &mut self.min_volume,
        }
    }

    /// `[rate, max_volume, min_volume]` for an order, if all three entries exist
    pub fn attributes_of(&self, order_id: &OrderId) -> Option<[Decimal; 3]> {
        Some([
            self.rate.value_of(order_id)?,
            self.max_volume.value_of(order_id)?,
            self.min_volume.value_of(order_id)?,
        ])
    }

    /// Remove an order from all three indexes, returning what each held
    pub fn remove_all(&mut self, order_id: &OrderId) -> [(Attribute, Option<Decimal>); 3] {
        Attribute::ALL.map(|attribute| (attribute, self.index_mut(attribute).remove(order_id)))
    }

    /// Member ids ascending. The rate index is authoritative for membership.
    pub fn member_ids(&self) -> impl Iterator<Item = &OrderId> + '_ {
        self.rate.ids()
    }

    pub fn len(&self) -> usize {
        self.rate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rate.is_empty()
    }

    /// All three indexes hold exactly the same ids
    pub fn is_synchronized(&self) -> bool {
        self.rate.ids().eq(self.max_volume.ids()) && self.rate.ids().eq(self.min_volume.ids())
    }
}
