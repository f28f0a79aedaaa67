//! Toll record types, field validation, and list filters.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hashing::content_hash;
use crate::types::{DbId, Timestamp};

/// Sort fields accepted by record listings; the first is the default.
pub const RECORD_SORT_FIELDS: &[&str] = &["date", "amount", "created_at", "id"];

/// A persisted toll-usage event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TollRecord {
    pub id: DbId,
    pub hash: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub entry_point: String,
    pub exit_point: String,
    pub amount: i64,
    pub vehicle_id: String,
    pub card_id: String,
    pub external_ref: Option<String>,
    pub external_row_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TollRecord {
    pub fn occurred_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// A validated candidate record ready for persistence.
///
/// Built only through [`NewTollRecord::new`], so `hash` always agrees with
/// the semantic fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewTollRecord {
    pub hash: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub entry_point: String,
    pub exit_point: String,
    pub amount: i64,
    pub vehicle_id: String,
    pub card_id: String,
    pub external_ref: Option<String>,
    pub external_row_id: Option<String>,
}

impl NewTollRecord {
    /// Validate and normalize the fields, then derive the content hash.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: NaiveDate,
        time: NaiveTime,
        entry_point: &str,
        exit_point: &str,
        amount: i64,
        vehicle_id: &str,
        card_id: &str,
        external_ref: Option<&str>,
        external_row_id: Option<&str>,
    ) -> Result<Self, CoreError> {
        let entry_point = required_text("entry_point", entry_point)?;
        let exit_point = required_text("exit_point", exit_point)?;
        let vehicle_id = required_text("vehicle_id", vehicle_id)?;
        let card_id = required_text("card_id", card_id)?;
        validate_amount(amount)?;

        let hash = content_hash(
            date,
            time,
            &entry_point,
            &exit_point,
            amount,
            &vehicle_id,
            &card_id,
        );

        Ok(Self {
            hash,
            date,
            time,
            entry_point,
            exit_point,
            amount,
            vehicle_id,
            card_id,
            external_ref: external_ref.map(|s| s.trim().to_string()),
            external_row_id: external_row_id.map(|s| s.trim().to_string()),
        })
    }

    pub fn occurred_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Request body for creating a single record outside of an import.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTollRecord {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub entry_point: String,
    pub exit_point: String,
    pub amount: i64,
    pub vehicle_id: String,
    pub card_id: String,
    pub external_ref: Option<String>,
    pub external_row_id: Option<String>,
}

impl CreateTollRecord {
    pub fn into_new_record(self) -> Result<NewTollRecord, CoreError> {
        NewTollRecord::new(
            self.date,
            self.time,
            &self.entry_point,
            &self.exit_point,
            self.amount,
            &self.vehicle_id,
            &self.card_id,
            self.external_ref.as_deref(),
            self.external_row_id.as_deref(),
        )
    }
}

/// Partial update for a record. Only `Some` fields change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTollRecord {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub entry_point: Option<String>,
    pub exit_point: Option<String>,
    pub amount: Option<i64>,
    pub vehicle_id: Option<String>,
    pub card_id: Option<String>,
    pub external_ref: Option<String>,
    pub external_row_id: Option<String>,
}

impl UpdateTollRecord {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.time.is_none()
            && self.entry_point.is_none()
            && self.exit_point.is_none()
            && self.amount.is_none()
            && self.vehicle_id.is_none()
            && self.card_id.is_none()
            && self.external_ref.is_none()
            && self.external_row_id.is_none()
    }

    /// Merge onto `current`, re-validating and re-hashing the result.
    pub fn apply_to(&self, current: &TollRecord) -> Result<NewTollRecord, CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation("Nothing to update".into()));
        }
        NewTollRecord::new(
            self.date.unwrap_or(current.date),
            self.time.unwrap_or(current.time),
            self.entry_point.as_deref().unwrap_or(&current.entry_point),
            self.exit_point.as_deref().unwrap_or(&current.exit_point),
            self.amount.unwrap_or(current.amount),
            self.vehicle_id.as_deref().unwrap_or(&current.vehicle_id),
            self.card_id.as_deref().unwrap_or(&current.card_id),
            self.external_ref
                .as_deref()
                .or(current.external_ref.as_deref()),
            self.external_row_id
                .as_deref()
                .or(current.external_row_id.as_deref()),
        )
    }
}

/// Filters for record listings.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub vehicle_id: Option<String>,
    pub card_id: Option<String>,
    pub entry_point: Option<String>,
    pub exit_point: Option<String>,
    /// Identifier filters match substrings instead of whole values.
    pub partial_match: bool,
}

impl RecordFilter {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(CoreError::Validation(format!(
                    "date_from ({from}) must not be after date_to ({to})"
                )));
            }
        }
        Ok(())
    }

    /// In-memory evaluation, mirroring the SQL used by the database store.
    pub fn matches(&self, record: &TollRecord) -> bool {
        let text = |filter: &Option<String>, value: &str| match filter {
            None => true,
            Some(f) if self.partial_match => value.contains(f.as_str()),
            Some(f) => value == f,
        };
        self.date_from.map_or(true, |d| record.date >= d)
            && self.date_to.map_or(true, |d| record.date <= d)
            && text(&self.vehicle_id, &record.vehicle_id)
            && text(&self.card_id, &record.card_id)
            && text(&self.entry_point, &record.entry_point)
            && text(&self.exit_point, &record.exit_point)
    }
}

/// Require a non-empty value after trimming; returns the trimmed value.
pub fn required_text(field: &str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

pub fn validate_amount(amount: i64) -> Result<(), CoreError> {
    if amount < 0 {
        return Err(CoreError::Validation(format!(
            "amount must be a non-negative integer, got {amount}"
        )));
    }
    Ok(())
}
