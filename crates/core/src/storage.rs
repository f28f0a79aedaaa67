//! Capability traits for the storage collaborator.
//!
//! The coordinator and mapping engine only talk to storage through these
//! traits. `tollsync-db` implements them on PostgreSQL and
//! `tollsync-pipeline` ships an in-memory implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::import_session::{ImportSession, SessionFilter};
use crate::mapping::{CreateMapping, Mapping, MappingFilter, UpdateMapping};
use crate::matching::ExternalCandidate;
use crate::pagination::{Page, PageRequest, SortSpec};
use crate::toll_record::{NewTollRecord, RecordFilter, TollRecord};
use crate::types::DbId;

#[async_trait]
pub trait TollRecordStore: Send + Sync {
    /// Insert a record. A hash that already exists is a `Conflict`.
    async fn create_record(&self, record: &NewTollRecord) -> Result<TollRecord, CoreError>;

    /// Answer, for each hash, whether a record with that hash exists.
    async fn batch_check_hashes_exist(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, bool>, CoreError>;

    async fn get_record_by_id(&self, id: DbId) -> Result<Option<TollRecord>, CoreError>;

    async fn list_records(
        &self,
        filter: &RecordFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<TollRecord>, CoreError>;

    /// Replace every semantic field. `None` if the id is unknown.
    async fn update_record(
        &self,
        id: DbId,
        record: &NewTollRecord,
    ) -> Result<Option<TollRecord>, CoreError>;

    /// `true` if a row was deleted.
    async fn delete_record(&self, id: DbId) -> Result<bool, CoreError>;
}

#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Insert a mapping and set every id in `deactivate` INACTIVE as one
    /// atomic step: if any part fails nothing changes. A second mapping with
    /// the same record, type and target is a `Conflict`.
    async fn create_mapping(
        &self,
        input: &CreateMapping,
        deactivate: &[DbId],
    ) -> Result<Mapping, CoreError>;

    async fn get_mapping(&self, id: DbId) -> Result<Option<Mapping>, CoreError>;

    async fn list_mappings(
        &self,
        filter: &MappingFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<Mapping>, CoreError>;

    /// Apply the supplied fields, deactivating `deactivate` in the same
    /// atomic step. `None` (and no change) if the id is unknown.
    async fn update_mapping(
        &self,
        id: DbId,
        input: &UpdateMapping,
        deactivate: &[DbId],
    ) -> Result<Option<Mapping>, CoreError>;

    async fn delete_mapping(&self, id: DbId) -> Result<bool, CoreError>;

    /// Every ACTIVE mapping of one toll record.
    async fn list_active_for_record(&self, toll_record_id: DbId) -> Result<Vec<Mapping>, CoreError>;
}

#[async_trait]
pub trait ImportSessionStore: Send + Sync {
    /// Insert a new session.
    async fn persist_session(&self, session: &ImportSession) -> Result<(), CoreError>;

    /// Overwrite status, counters, error log and timestamps.
    async fn update_session(&self, session: &ImportSession) -> Result<(), CoreError>;

    async fn get_session(&self, id: &str) -> Result<Option<ImportSession>, CoreError>;

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<ImportSession>, CoreError>;
}

/// Supplies external entities that may match a toll record.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Candidates sharing the record's card or vehicle id, or occurring
    /// within `window` of it.
    async fn candidates_for(
        &self,
        record: &TollRecord,
        window: Duration,
    ) -> Result<Vec<ExternalCandidate>, CoreError>;
}

/// Storage reachability, reported by the health endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn ping(&self) -> Result<(), CoreError>;
}
