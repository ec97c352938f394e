//! Order record type and input validation
//!
//! An order is immutable once accepted: there is no partial fill or amend.
//! A rate or volume change is a remove followed by an add.

use crate::errors::OrderError;
use crate::ids::{DirectionalPair, MakerId, OrderId, TokenId};
use crate::numeric::{Rate, Volume};
use serde::{Deserialize, Serialize};

/// Complete order: identity fields plus the three indexed attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub maker_id: MakerId,
    pub token_bid: TokenId,
    pub token_ask: TokenId,
    pub rate: Rate,
    pub max_volume: Volume,
    pub min_volume: Volume,
}

impl Order {
    /// Directional pair this order is indexed under
    pub fn pair(&self) -> DirectionalPair {
        DirectionalPair::new(self.token_bid.clone(), self.token_ask.clone())
    }

    /// Identity fields only, as held by the canonical record store
    pub fn record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id.clone(),
            maker_id: self.maker_id.clone(),
            token_bid: self.token_bid.clone(),
            token_ask: self.token_ask.clone(),
        }
    }

    /// Check the order is well formed.
    ///
    /// Checks performed (in order):
    /// 1. No empty identifier
    /// 2. Bid and ask tokens differ
    /// 3. Rate strictly positive
    /// 4. Volumes non-negative
    /// 5. `min_volume <= max_volume`
    pub fn validate(&self) -> Result<(), OrderError> {
        for (field, empty) in [
            ("id", self.id.is_empty()),
            ("maker_id", self.maker_id.is_empty()),
            ("token_bid", self.token_bid.is_empty()),
            ("token_ask", self.token_ask.is_empty()),
        ] {
            if empty {
                return Err(OrderError::EmptyIdentifier { field });
            }
        }

        if self.token_bid == self.token_ask {
            return Err(OrderError::IdenticalTokens {
                token: self.token_bid.to_string(),
            });
        }

        if !self.rate.is_positive() {
            return Err(OrderError::NonPositiveRate {
                rate: self.rate.to_string(),
            });
        }

        for (field, volume) in [("max_volume", self.max_volume), ("min_volume", self.min_volume)] {
            if volume.is_negative() {
                return Err(OrderError::NegativeVolume {
                    field,
                    volume: volume.to_string(),
                });
            }
        }

        if self.min_volume > self.max_volume {
            return Err(OrderError::InvertedVolumeBounds {
                min_volume: self.min_volume.to_string(),
                max_volume: self.max_volume.to_string(),
            });
        }

        Ok(())
    }
}

/// Canonical record: the identity fields of an order, without indexed attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub maker_id: MakerId,
    pub token_bid: TokenId,
    pub token_ask: TokenId,
}

impl OrderRecord {
    pub fn pair(&self) -> DirectionalPair {
        DirectionalPair::new(self.token_bid.clone(), self.token_ask.clone())
    }
}
