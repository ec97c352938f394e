//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::str::FromStr;

use order_index::{MemoryBackend, OrderIndex};
use rust_decimal::Decimal;
use types::ids::{MakerId, OrderId, TokenId};
use types::order::Order;

pub fn token(name: &str) -> TokenId {
    TokenId::from(name)
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Order with decimal-string attributes
pub fn order(id: &str, maker: &str, pair: (&str, &str), rate: &str, max_volume: &str, min_volume: &str) -> Order {
    Order {
        id: OrderId::from(id),
        maker_id: MakerId::from(maker),
        token_bid: token(pair.0),
        token_ask: token(pair.1),
        rate: dec(rate).into(),
        max_volume: dec(max_volume).into(),
        min_volume: dec(min_volume).into(),
    }
}

/// Engine over a fresh memory backend, plus a handle on that backend
pub fn memory_index() -> (OrderIndex, MemoryBackend) {
    let backend = MemoryBackend::new();
    (OrderIndex::new(backend.clone()), backend)
}

pub fn ids(orders: &[Order]) -> Vec<String> {
    orders
        .iter()
        .map(|o| String::from_utf8_lossy(o.id.as_bytes()).into_owned())
        .collect()
}
