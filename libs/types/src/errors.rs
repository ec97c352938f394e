//! Input validation errors
//!
//! These are caller errors: terminal for the call, never worth retrying
//! with the same arguments.

use thiserror::Error;

/// Order-specific validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Empty identifier: {field}")]
    EmptyIdentifier { field: &'static str },

    #[error("Bid and ask token are identical: {token}")]
    IdenticalTokens { token: String },

    #[error("Rate must be positive, got {rate}")]
    NonPositiveRate { rate: String },

    #[error("Volume must be non-negative: {field} = {volume}")]
    NegativeVolume { field: &'static str, volume: String },

    #[error("Inverted volume bounds: min_volume {min_volume} > max_volume {max_volume}")]
    InvertedVolumeBounds {
        min_volume: String,
        max_volume: String,
    },
}

/// Pagination argument errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("Invalid {field}: {value} (expected -1 or a non-negative value)")]
    InvalidPage { field: &'static str, value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_error_display() {
        let err = OrderError::NonPositiveRate {
            rate: "0".to_string(),
        };
        assert_eq!(err.to_string(), "Rate must be positive, got 0");
    }

    #[test]
    fn test_inverted_bounds_display() {
        let err = OrderError::InvertedVolumeBounds {
            min_volume: "5".to_string(),
            max_volume: "1.5".to_string(),
        };
        assert!(err.to_string().contains("5"));
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn test_page_error_display() {
        let err = PageError::InvalidPage {
            field: "limit",
            value: -7,
        };
        assert!(err.to_string().contains("limit"));
        assert!(err.to_string().contains("-7"));
    }
}
