//! Toll record ↔ external entity mappings: status, validation, filters and
//! the policies that govern ACTIVE uniqueness and deletes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Sort fields accepted by mapping listings; the first is the default.
pub const MAPPING_SORT_FIELDS: &[&str] = &["created_at", "updated_at", "confidence", "id"];

pub type Metadata = BTreeMap<String, String>;

// ── Status ───────────────────────────────────────────────────────────

/// Mapping status. `Unspecified` exists only so that a missing value can be
/// represented and rejected; it is never persisted.
#[repr(i16)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingStatus {
    #[default]
    Unspecified = 0,
    Active = 1,
    Inactive = 2,
    Pending = 3,
    Rejected = 4,
}

impl MappingStatus {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Result<Self, CoreError> {
        match id {
            0 => Ok(Self::Unspecified),
            1 => Ok(Self::Active),
            2 => Ok(Self::Inactive),
            3 => Ok(Self::Pending),
            4 => Ok(Self::Rejected),
            other => Err(CoreError::Internal(format!(
                "Unknown mapping status id {other}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "UNSPECIFIED",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Pending => "PENDING",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNSPECIFIED" => Ok(Self::Unspecified),
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            "PENDING" => Ok(Self::Pending),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(CoreError::Validation(format!(
                "Invalid mapping status '{other}'"
            ))),
        }
    }

    /// Reject `Unspecified`; every other status is storable.
    pub fn require_specified(self) -> Result<Self, CoreError> {
        if self == Self::Unspecified {
            return Err(CoreError::Validation(
                "status must be specified".into(),
            ));
        }
        Ok(self)
    }
}

impl std::fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Entities and DTOs ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: DbId,
    pub toll_record_id: DbId,
    pub mapping_type: String,
    pub mapped_entity_id: DbId,
    pub mapped_entity_type: String,
    pub confidence: f64,
    pub status: MappingStatus,
    pub metadata: Metadata,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Request to create a mapping.
#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct CreateMapping {
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub toll_record_id: DbId,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub mapping_type: String,
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub mapped_entity_id: DbId,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub mapped_entity_type: String,
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0 and 1"))]
    pub confidence: f64,
    #[serde(default)]
    pub status: MappingStatus,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl CreateMapping {
    /// Trim text fields, then apply every creation rule.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        self.mapping_type = self.mapping_type.trim().to_string();
        self.mapped_entity_type = self.mapped_entity_type.trim().to_string();
        self.created_by = self
            .created_by
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self.validate()?;
        validate_confidence(self.confidence)?;
        self.status.require_specified()?;
        Ok(self)
    }
}

/// Partial update; only supplied fields change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct UpdateMapping {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub mapping_type: Option<String>,
    #[validate(range(min = 1, message = "must be a positive id"))]
    pub mapped_entity_id: Option<DbId>,
    #[validate(length(min = 1, message = "must not be empty"))]
    pub mapped_entity_type: Option<String>,
    #[validate(range(min = 0.0, max = 1.0, message = "must be between 0 and 1"))]
    pub confidence: Option<f64>,
    pub status: Option<MappingStatus>,
    pub metadata: Option<Metadata>,
}

impl UpdateMapping {
    pub fn is_empty(&self) -> bool {
        self.mapping_type.is_none()
            && self.mapped_entity_id.is_none()
            && self.mapped_entity_type.is_none()
            && self.confidence.is_none()
            && self.status.is_none()
            && self.metadata.is_none()
    }

    pub fn normalized(mut self) -> Result<Self, CoreError> {
        if self.is_empty() {
            return Err(CoreError::Validation("Nothing to update".into()));
        }
        self.mapping_type = self.mapping_type.map(|s| s.trim().to_string());
        self.mapped_entity_type = self.mapped_entity_type.map(|s| s.trim().to_string());
        self.validate()?;
        if let Some(confidence) = self.confidence {
            validate_confidence(confidence)?;
        }
        if let Some(status) = self.status {
            status.require_specified()?;
        }
        Ok(self)
    }

    /// Apply onto an existing mapping (used by the in-memory store).
    pub fn apply_to(&self, mapping: &mut Mapping, now: Timestamp) {
        if let Some(v) = &self.mapping_type {
            mapping.mapping_type = v.clone();
        }
        if let Some(v) = self.mapped_entity_id {
            mapping.mapped_entity_id = v;
        }
        if let Some(v) = &self.mapped_entity_type {
            mapping.mapped_entity_type = v.clone();
        }
        if let Some(v) = self.confidence {
            mapping.confidence = v;
        }
        if let Some(v) = self.status {
            mapping.status = v;
        }
        if let Some(v) = &self.metadata {
            mapping.metadata = v.clone();
        }
        mapping.updated_at = now;
    }
}

/// Confidence must be a finite value in `[0, 1]`.
pub fn validate_confidence(confidence: f64) -> Result<(), CoreError> {
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(CoreError::Validation(format!(
            "confidence must be between 0 and 1, got {confidence}"
        )));
    }
    Ok(())
}

/// Ids supplied by callers must be positive.
pub fn validate_id(entity: &str, id: DbId) -> Result<(), CoreError> {
    if id <= 0 {
        return Err(CoreError::Validation(format!(
            "{entity} id must be positive, got {id}"
        )));
    }
    Ok(())
}

// ── Filters ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MappingFilter {
    pub toll_record_id: Option<DbId>,
    pub mapping_type: Option<String>,
    pub mapped_entity_type: Option<String>,
    pub mapped_entity_id: Option<DbId>,
    pub status: Option<MappingStatus>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
}

impl MappingFilter {
    pub fn validate(&self) -> Result<(), CoreError> {
        if let Some(min) = self.min_confidence {
            validate_confidence(min)?;
        }
        if let Some(max) = self.max_confidence {
            validate_confidence(max)?;
        }
        if let (Some(min), Some(max)) = (self.min_confidence, self.max_confidence) {
            if min > max {
                return Err(CoreError::Validation(format!(
                    "min_confidence ({min}) must not exceed max_confidence ({max})"
                )));
            }
        }
        Ok(())
    }

    pub fn matches(&self, m: &Mapping) -> bool {
        self.toll_record_id.map_or(true, |v| v == m.toll_record_id)
            && self
                .mapping_type
                .as_ref()
                .map_or(true, |v| *v == m.mapping_type)
            && self
                .mapped_entity_type
                .as_ref()
                .map_or(true, |v| *v == m.mapped_entity_type)
            && self.mapped_entity_id.map_or(true, |v| v == m.mapped_entity_id)
            && self.status.map_or(true, |v| v == m.status)
            && self.min_confidence.map_or(true, |v| m.confidence >= v)
            && self.max_confidence.map_or(true, |v| m.confidence <= v)
    }
}

// ── Policies ─────────────────────────────────────────────────────────

/// What happens when a mapping becomes ACTIVE while the same toll record
/// already has an ACTIVE mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActiveMappingPolicy {
    /// Refuse with a conflict.
    #[default]
    Reject,
    /// Move the existing ACTIVE mappings to INACTIVE.
    Replace,
}

/// Outcome of [`ActiveMappingPolicy::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveResolution {
    Proceed,
    /// Deactivate these mapping ids together with the write.
    Deactivate(Vec<DbId>),
}

impl ActiveMappingPolicy {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "replace" => Ok(Self::Replace),
            other => Err(CoreError::Validation(format!(
                "Invalid active mapping policy '{other}' (expected reject or replace)"
            ))),
        }
    }

    /// Decide how `toll_record_id` may receive a new ACTIVE mapping.
    ///
    /// `existing_active` lists the record's current ACTIVE mappings;
    /// `updating` is the id of the mapping being changed, if any, which is
    /// never counted against itself.
    pub fn resolve(
        self,
        toll_record_id: DbId,
        existing_active: &[Mapping],
        updating: Option<DbId>,
    ) -> Result<ActiveResolution, CoreError> {
        let others: Vec<DbId> = existing_active
            .iter()
            .filter(|m| m.status == MappingStatus::Active && Some(m.id) != updating)
            .map(|m| m.id)
            .collect();
        if others.is_empty() {
            return Ok(ActiveResolution::Proceed);
        }
        match self {
            Self::Reject => Err(CoreError::Conflict(format!(
                "Toll record {toll_record_id} already has an active mapping"
            ))),
            Self::Replace => Ok(ActiveResolution::Deactivate(others)),
        }
    }
}

/// What deleting a missing mapping or record returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletePolicy {
    #[default]
    NotFound,
    Idempotent,
}

impl DeletePolicy {
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "not_found" => Ok(Self::NotFound),
            "ok" | "idempotent" => Ok(Self::Idempotent),
            other => Err(CoreError::Validation(format!(
                "Invalid delete policy '{other}' (expected not_found or ok)"
            ))),
        }
    }

    /// Turn the store's "was anything deleted" answer into a result.
    pub fn check(self, deleted: bool, entity: &'static str, id: DbId) -> Result<(), CoreError> {
        match (deleted, self) {
            (true, _) | (false, Self::Idempotent) => Ok(()),
            (false, Self::NotFound) => Err(CoreError::not_found(entity, id)),
        }
    }
}
