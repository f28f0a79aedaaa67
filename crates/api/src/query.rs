//! Query parameter types for the list endpoints.
//!
//! Every listing accepts `page`, `page_size`, `sort_by` and `sort_order`
//! next to its own filters. The structs are kept flat because
//! `serde(flatten)` loses numeric types in query strings.

use chrono::NaiveDate;
use serde::Deserialize;
use tollsync_core::error::CoreError;
use tollsync_core::import_session::{ImportStatus, SessionFilter, SESSION_SORT_FIELDS};
use tollsync_core::mapping::{MappingFilter, MappingStatus, MAPPING_SORT_FIELDS};
use tollsync_core::pagination::{PageRequest, SortSpec};
use tollsync_core::toll_record::{RecordFilter, RECORD_SORT_FIELDS};
use tollsync_core::types::DbId;

/// Validate paging and resolve the sort key against `allowed`.
fn paging(
    page: Option<i64>,
    page_size: Option<i64>,
    sort_by: Option<&str>,
    sort_order: Option<&str>,
    allowed: &[&'static str],
) -> Result<(PageRequest, SortSpec), CoreError> {
    Ok((
        PageRequest::new(page, page_size)?,
        SortSpec::parse(sort_by, sort_order, allowed)?,
    ))
}

/// `GET /imports` query.
#[derive(Debug, Default, Deserialize)]
pub struct SessionListParams {
    pub account_type: Option<String>,
    pub account_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl SessionListParams {
    pub fn into_parts(self) -> Result<(SessionFilter, PageRequest, SortSpec), CoreError> {
        let (page, sort) = paging(
            self.page,
            self.page_size,
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
            SESSION_SORT_FIELDS,
        )?;
        let filter = SessionFilter {
            account_type: self.account_type,
            account_id: self.account_id,
            status: self.status.as_deref().map(ImportStatus::parse).transpose()?,
        };
        Ok((filter, page, sort))
    }
}

/// `GET /records` query.
#[derive(Debug, Default, Deserialize)]
pub struct RecordListParams {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub vehicle_id: Option<String>,
    pub card_id: Option<String>,
    pub entry_point: Option<String>,
    pub exit_point: Option<String>,
    #[serde(default)]
    pub partial_match: bool,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl RecordListParams {
    pub fn into_parts(self) -> Result<(RecordFilter, PageRequest, SortSpec), CoreError> {
        let (page, sort) = paging(
            self.page,
            self.page_size,
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
            RECORD_SORT_FIELDS,
        )?;
        let filter = RecordFilter {
            date_from: self.date_from,
            date_to: self.date_to,
            vehicle_id: self.vehicle_id,
            card_id: self.card_id,
            entry_point: self.entry_point,
            exit_point: self.exit_point,
            partial_match: self.partial_match,
        };
        Ok((filter, page, sort))
    }
}

/// `GET /mappings` query.
#[derive(Debug, Default, Deserialize)]
pub struct MappingListParams {
    pub toll_record_id: Option<DbId>,
    pub mapping_type: Option<String>,
    pub mapped_entity_type: Option<String>,
    pub mapped_entity_id: Option<DbId>,
    pub status: Option<String>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl MappingListParams {
    pub fn into_parts(self) -> Result<(MappingFilter, PageRequest, SortSpec), CoreError> {
        let (page, sort) = paging(
            self.page,
            self.page_size,
            self.sort_by.as_deref(),
            self.sort_order.as_deref(),
            MAPPING_SORT_FIELDS,
        )?;
        let status = self
            .status
            .as_deref()
            .map(|raw| MappingStatus::parse(raw)?.require_specified())
            .transpose()?;
        let filter = MappingFilter {
            toll_record_id: self.toll_record_id,
            mapping_type: self.mapping_type,
            mapped_entity_type: self.mapped_entity_type,
            mapped_entity_id: self.mapped_entity_id,
            status,
            min_confidence: self.min_confidence,
            max_confidence: self.max_confidence,
        };
        Ok((filter, page, sort))
    }
}

/// `GET /records/{id}/potential-matches` query.
#[derive(Debug, Default, Deserialize)]
pub struct ThresholdParams {
    /// Minimum confidence; all scored candidates when absent.
    pub threshold: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn session_params_apply_defaults() {
        let (filter, page, sort) = SessionListParams::default().into_parts().unwrap();
        assert!(filter.status.is_none());
        assert_eq!(page, PageRequest::default());
        assert_eq!(sort.field, "created_at");
    }

    #[test]
    fn unknown_session_status_rejected() {
        let params = SessionListParams {
            status: Some("RUNNING".into()),
            ..Default::default()
        };
        assert_matches!(params.into_parts(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn unspecified_mapping_status_filter_rejected() {
        let params = MappingListParams {
            status: Some("unspecified".into()),
            ..Default::default()
        };
        assert_matches!(params.into_parts(), Err(CoreError::Validation(_)));

        let params = MappingListParams {
            status: Some("active".into()),
            ..Default::default()
        };
        let (filter, _, _) = params.into_parts().unwrap();
        assert_eq!(filter.status, Some(MappingStatus::Active));
    }

    #[test]
    fn record_sort_must_be_whitelisted() {
        let params = RecordListParams {
            sort_by: Some("hash".into()),
            ..Default::default()
        };
        assert_matches!(params.into_parts(), Err(CoreError::Validation(_)));
    }
}
