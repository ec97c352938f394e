//! Pagination window for list queries
//!
//! The wire convention is a pair of signed integers where `-1` means
//! "unrestricted" in that dimension. Internally the window is two options.

use crate::errors::PageError;
use serde::{Deserialize, Serialize};

/// Sentinel meaning "no limit" / "no offset"
pub const UNRESTRICTED: i64 = -1;

/// Offset is applied first, then limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Page {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    /// Every row, from the start
    pub fn all() -> Self {
        Self::default()
    }

    /// First `limit` rows
    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    /// Convert the `-1` sentinel convention.
    pub fn from_sentinels(limit: i64, offset: i64) -> Result<Self, PageError> {
        Ok(Self {
            limit: Self::dimension("limit", limit)?,
            offset: Self::dimension("offset", offset)?,
        })
    }

    fn dimension(field: &'static str, value: i64) -> Result<Option<usize>, PageError> {
        match value {
            UNRESTRICTED => Ok(None),
            v if v < 0 => Err(PageError::InvalidPage { field, value }),
            v => usize::try_from(v)
                .map(Some)
                .map_err(|_| PageError::InvalidPage { field, value }),
        }
    }

    pub fn skip(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    pub fn take(&self) -> usize {
        self.limit.unwrap_or(usize::MAX)
    }

    /// Apply the window to an ordered iterator.
    pub fn apply<I: Iterator>(&self, iter: I) -> std::iter::Take<std::iter::Skip<I>> {
        iter.skip(self.skip()).take(self.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_mean_unrestricted() {
        let page = Page::from_sentinels(-1, -1).unwrap();
        assert_eq!(page, Page::all());
        assert_eq!(page.skip(), 0);
        assert_eq!(page.take(), usize::MAX);
    }

    #[test]
    fn test_literal_values() {
        let page = Page::from_sentinels(2, 1).unwrap();
        assert_eq!(page, Page::new(2, 1));
        let window: Vec<_> = page.apply(1..=5).collect();
        assert_eq!(window, vec![2, 3]);
    }

    #[test]
    fn test_zero_limit_is_literal() {
        let page = Page::from_sentinels(0, -1).unwrap();
        assert_eq!(page.apply(1..=5).count(), 0);
    }

    #[test]
    fn test_below_sentinel_rejected() {
        assert_eq!(
            Page::from_sentinels(-2, 0),
            Err(PageError::InvalidPage {
                field: "limit",
                value: -2
            })
        );
        assert!(Page::from_sentinels(3, -5).is_err());
    }

    #[test]
    fn test_offset_past_end() {
        let page = Page::new(10, 10);
        assert_eq!(page.apply(1..=5).count(), 0);
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn window_matches_slice(limit in -1i64..12, offset in -1i64..12, len in 0usize..10) {
                let page = Page::from_sentinels(limit, offset).unwrap();
                let items: Vec<usize> = (0..len).collect();
                let start = page.skip().min(len);
                let end = start.saturating_add(page.take()).min(len);
                let window: Vec<usize> = page.apply(items.iter().copied()).collect();
                prop_assert_eq!(window, items[start..end].to_vec());
            }

            #[test]
            fn below_sentinel_always_rejected(value in i64::MIN..-1) {
                prop_assert!(Page::from_sentinels(value, 0).is_err());
                prop_assert!(Page::from_sentinels(0, value).is_err());
            }
        }
    }
}
