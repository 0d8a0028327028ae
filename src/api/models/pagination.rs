//! Shared pagination types for list endpoints.
//!
//! All list endpoints take 1-based `page` and `limit` query parameters and
//! return the total row count so clients can render page controls.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default number of items per page.
pub const DEFAULT_LIMIT: i64 = 20;

/// Maximum number of items per page.
pub const MAX_LIMIT: i64 = 100;

/// Standard pagination query parameters.
///
/// Out-of-range values are clamped rather than rejected: `page` is at least
/// 1 and `limit` lands in `1..=100`.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// 1-based page number (default: 1)
    #[param(default = 1, minimum = 1)]
    pub page: Option<i64>,

    /// Maximum number of items to return (default: 20, max: 100)
    #[param(default = 20, minimum = 1, maximum = 100)]
    pub limit: Option<i64>,
}

impl Pagination {
    #[inline]
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    #[inline]
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Row offset for the current page.
    #[inline]
    pub fn skip(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

/// Generic paginated response wrapper for list endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    /// The items for the current page
    pub data: Vec<T>,
    /// Total number of items matching the query (before pagination)
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            data,
            total,
            page: pagination.page(),
            limit: pagination.limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = Pagination::default();
        assert_eq!(p.page(), 1);
        assert_eq!(p.limit(), DEFAULT_LIMIT);
        assert_eq!(p.skip(), 0);
    }

    #[test]
    fn limit_is_clamped() {
        let p = Pagination {
            page: None,
            limit: Some(0),
        };
        assert_eq!(p.limit(), 1);

        let p = Pagination {
            page: None,
            limit: Some(10_000),
        };
        assert_eq!(p.limit(), MAX_LIMIT);
    }

    #[test]
    fn page_below_one_is_clamped() {
        let p = Pagination {
            page: Some(-3),
            limit: Some(25),
        };
        assert_eq!(p.page(), 1);
        assert_eq!(p.skip(), 0);
    }

    #[test]
    fn skip_follows_page_and_limit() {
        let p = Pagination {
            page: Some(3),
            limit: Some(25),
        };
        assert_eq!(p.skip(), 50);
    }
}
