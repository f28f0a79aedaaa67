//! Shared response envelope types for API handlers.
//!
//! Single items use `{ "data": ... }`; listings add the page coordinates and
//! the unpaginated match count.

use serde::Serialize;
use tollsync_core::pagination::{Page, PageRequest};

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "data": [...], "total_count", "page", "page_size" }` envelope.
#[derive(Debug, Serialize)]
pub struct ListResponse<T: Serialize> {
    pub data: Vec<T>,
    pub total_count: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(page: Page<T>, request: &PageRequest) -> Self {
        Self {
            data: page.items,
            total_count: page.total_count,
            page: request.page,
            page_size: request.page_size,
        }
    }
}
