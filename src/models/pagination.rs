//! Pagination primitives shared across list endpoints.

use serde::{Deserialize, Serialize};

/// Pagination query parameters (1-indexed `page`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Maximum items per page.
    const MAX_LIMIT: i64 = 100;

    /// Default items per page.
    const DEFAULT_LIMIT: i64 = 20;

    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    /// Saturates instead of overflowing on absurd page numbers.
    pub fn offset(&self) -> i64 {
        (self.current_page() - 1).saturating_mul(self.limit())
    }

    pub fn current_page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Paged result envelope returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        let limit = pagination.limit();
        let total_pages = (total + limit - 1) / limit;
        Self {
            items,
            total,
            page: pagination.current_page(),
            limit,
            total_pages,
        }
    }

    /// An empty page, used when storage is unavailable.
    pub fn empty(pagination: &Pagination) -> Self {
        Self::new(Vec::new(), 0, pagination)
    }
}
