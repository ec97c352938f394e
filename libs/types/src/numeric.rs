//! Fixed-point decimal types for rates and volumes
//!
//! Uses rust_decimal so index keys compare exactly: `1.0` and `1.00` are the
//! same key, and no rounding drift can reorder two orders.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange rate of an order, price of ask per bid. Positive for any valid order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl FromStr for Rate {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s).map(Self)
    }
}

impl From<Decimal> for Rate {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Order volume bound (either the maximum or the minimum fill size)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(Decimal);

impl Volume {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl FromStr for Volume {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s).map(Self)
    }
}

impl From<Decimal> for Volume {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_parse_and_sign() {
        let rate: Rate = "0.0025".parse().unwrap();
        assert!(rate.is_positive());
        assert!(!Rate::new(Decimal::ZERO).is_positive());
    }

    #[test]
    fn test_scale_does_not_affect_equality() {
        let a: Volume = "1.0".parse().unwrap();
        let b: Volume = "1.00".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_volume_serializes_as_string() {
        let v: Volume = "12.5".parse().unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"12.5\"");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!("abc".parse::<Rate>().is_err());
    }
}
