//! Page/sort request validation shared by every list operation.
//!
//! Pages are 1-based; `page_size` is bounded to `1..=MAX_PAGE_SIZE`. Out of
//! range values are rejected rather than clamped.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Ascending or descending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parse `asc` / `desc` (case-insensitive).
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(CoreError::Validation(format!(
                "Invalid sort direction '{other}'. Must be one of: asc, desc"
            ))),
        }
    }
}

/// A validated page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct PageRequest {
    #[validate(range(min = 1, message = "page must be >= 1"))]
    pub page: i64,
    #[validate(range(min = 1, max = 1000, message = "page_size must be between 1 and 1000"))]
    pub page_size: i64,
}

impl PageRequest {
    /// Build and validate a page request, applying defaults for absent values.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Result<Self, CoreError> {
        let request = Self {
            page: page.unwrap_or(DEFAULT_PAGE),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// Slice an already-ordered collection to this page.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let len = usize::try_from(self.limit()).unwrap_or(0);
        items.iter().skip(start).take(len).cloned().collect()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A sort key validated against a per-entity whitelist.
///
/// `field` is always one of the whitelisted names, so storage layers may
/// interpolate it into ORDER BY clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: &'static str,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Resolve `field` against `allowed`; the first allowed entry is the default.
    pub fn parse(
        field: Option<&str>,
        direction: Option<&str>,
        allowed: &[&'static str],
    ) -> Result<Self, CoreError> {
        let direction = match direction {
            Some(d) => SortDirection::parse(d)?,
            None => SortDirection::default(),
        };
        let field = match field.map(str::trim).filter(|f| !f.is_empty()) {
            None => allowed
                .first()
                .copied()
                .ok_or_else(|| CoreError::Internal("empty sort whitelist".into()))?,
            Some(requested) => allowed
                .iter()
                .copied()
                .find(|a| a.eq_ignore_ascii_case(requested))
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Invalid sort field '{requested}'. Must be one of: {}",
                        allowed.join(", ")
                    ))
                })?,
        };
        Ok(Self { field, direction })
    }
}

/// One page of results plus the unpaginated match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }
}
