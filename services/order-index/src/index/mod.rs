//! Per-pair ordered indexes
//!
//! Contains the single-attribute index and the three-index set kept for
//! every provisioned directional pair.

pub mod attribute_index;
pub mod pair_index;

pub use attribute_index::AttributeIndex;
pub use pair_index::PairIndexSet;

use rust_decimal::Decimal;
use std::fmt;
use types::order::Order;

/// Order attribute an index is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Rate,
    MaxVolume,
    MinVolume,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [Attribute::Rate, Attribute::MaxVolume, Attribute::MinVolume];

    pub fn label(&self) -> &'static str {
        match self {
            Attribute::Rate => "rate",
            Attribute::MaxVolume => "max_volume",
            Attribute::MinVolume => "min_volume",
        }
    }

    /// Value of this attribute on an order, i.e. the index key
    pub fn value_of(&self, order: &Order) -> Decimal {
        match self {
            Attribute::Rate => order.rate.as_decimal(),
            Attribute::MaxVolume => order.max_volume.as_decimal(),
            Attribute::MinVolume => order.min_volume.as_decimal(),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Iteration order over an attribute index. Ties always go by order id ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Ascending,
    Descending,
}
