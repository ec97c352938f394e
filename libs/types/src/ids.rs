//! Opaque identifier types for orders, makers and tokens
//!
//! Identifiers are arbitrary byte strings supplied by callers. They order
//! bytewise (lexicographically), which is the order every index uses to break
//! ties, and render as lowercase hex in logs and JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! byte_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wrap raw bytes
            pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
                Self(bytes.into())
            }

            /// Parse a hex rendering produced by `Display`
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                hex::decode(s).map(Self)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.as_bytes().to_vec())
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<String> for $name {
            type Error = hex::FromHexError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_hex(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                hex::encode(id.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

byte_id!(
    /// Unique identifier for an order
    OrderId
);

byte_id!(
    /// Identifier of the order's owner. Not unique across orders.
    MakerId
);

byte_id!(
    /// Asset identifier; one side of a pair
    TokenId
);

impl OrderId {
    /// Mint a fresh id from a UUID v7, so ids sort roughly by creation time.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().as_bytes().to_vec())
    }
}

impl MakerId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().as_bytes().to_vec())
    }
}

/// Directional pair: `(bid, ask)` and `(ask, bid)` are distinct index spaces.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DirectionalPair {
    pub token_bid: TokenId,
    pub token_ask: TokenId,
}

impl DirectionalPair {
    pub fn new(token_bid: TokenId, token_ask: TokenId) -> Self {
        Self {
            token_bid,
            token_ask,
        }
    }

    /// The same pair seen from the other side
    pub fn reversed(&self) -> Self {
        Self {
            token_bid: self.token_ask.clone(),
            token_ask: self.token_bid.clone(),
        }
    }
}

impl fmt::Display for DirectionalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.token_bid, self.token_ask)
    }
}

impl fmt::Debug for DirectionalPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DirectionalPair({})", self)
    }
}
