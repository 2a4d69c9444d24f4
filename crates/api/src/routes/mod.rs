//! HTTP route handlers, one module per service.

pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reconciliation;

use domain::{Page, PageRequest};
use serde::Serialize;

use crate::error::ApiError;

/// Largest page size any list endpoint accepts.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Pagination block of list responses.
#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

impl<T> From<&Page<T>> for Pagination {
    fn from(page: &Page<T>) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total: page.total,
            pages: page.pages,
        }
    }
}

pub(crate) fn page_request(
    page: Option<u32>,
    limit: Option<u32>,
    default_limit: u32,
) -> Result<PageRequest, ApiError> {
    Ok(PageRequest::new(
        page.unwrap_or(1),
        limit.unwrap_or(default_limit),
        MAX_PAGE_LIMIT,
    )?)
}
