//! Toll record CRUD on top of the storage collaborator.

use std::sync::Arc;

use tollsync_core::error::CoreError;
use tollsync_core::mapping::{validate_id, DeletePolicy};
use tollsync_core::pagination::{Page, PageRequest, SortSpec};
use tollsync_core::storage::TollRecordStore;
use tollsync_core::toll_record::{CreateTollRecord, RecordFilter, TollRecord, UpdateTollRecord};
use tollsync_core::types::DbId;

#[derive(Clone)]
pub struct TollRecordService {
    records: Arc<dyn TollRecordStore>,
    delete_policy: DeletePolicy,
}

impl TollRecordService {
    pub fn new(records: Arc<dyn TollRecordStore>, delete_policy: DeletePolicy) -> Self {
        Self {
            records,
            delete_policy,
        }
    }

    /// Create a record. Identical content is a conflict.
    pub async fn create_record(&self, input: CreateTollRecord) -> Result<TollRecord, CoreError> {
        let record = input.into_new_record()?;
        let created = self.records.create_record(&record).await?;
        tracing::info!(record_id = created.id, "Toll record created");
        Ok(created)
    }

    pub async fn get_record(&self, id: DbId) -> Result<TollRecord, CoreError> {
        validate_id("toll record", id)?;
        self.records
            .get_record_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("TollRecord", id))
    }

    pub async fn list_records(
        &self,
        filter: &RecordFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<TollRecord>, CoreError> {
        filter.validate()?;
        self.records.list_records(filter, page, sort).await
    }

    /// Merge the supplied fields and re-derive the hash.
    pub async fn update_record(&self, id: DbId, input: UpdateTollRecord) -> Result<TollRecord, CoreError> {
        let current = self.get_record(id).await?;
        let merged = input.apply_to(&current)?;
        let updated = self
            .records
            .update_record(id, &merged)
            .await?
            .ok_or_else(|| CoreError::not_found("TollRecord", id))?;
        tracing::info!(record_id = id, "Toll record updated");
        Ok(updated)
    }

    pub async fn delete_record(&self, id: DbId) -> Result<(), CoreError> {
        validate_id("toll record", id)?;
        let deleted = self.records.delete_record(id).await?;
        if deleted {
            tracing::info!(record_id = id, "Toll record deleted");
        }
        self.delete_policy.check(deleted, "TollRecord", id)
    }
}
