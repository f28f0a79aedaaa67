//! Mapping engine: validated CRUD over mappings plus candidate matching.

use std::sync::Arc;
use std::time::Duration;

use tollsync_core::error::CoreError;
use tollsync_core::mapping::{
    validate_confidence, validate_id, ActiveMappingPolicy, ActiveResolution, CreateMapping,
    DeletePolicy, Mapping, MappingFilter, MappingStatus, UpdateMapping,
};
use tollsync_core::matching::{MatchScorer, PotentialMatch};
use tollsync_core::pagination::{Page, PageRequest, SortSpec};
use tollsync_core::storage::{CandidateSource, MappingStore, TollRecordStore};
use tollsync_core::types::DbId;

use crate::config::PipelineConfig;

#[derive(Clone)]
pub struct MappingEngine {
    mappings: Arc<dyn MappingStore>,
    records: Arc<dyn TollRecordStore>,
    candidates: Arc<dyn CandidateSource>,
    scorer: MatchScorer,
    active_policy: ActiveMappingPolicy,
    delete_policy: DeletePolicy,
}

impl MappingEngine {
    pub fn new(
        mappings: Arc<dyn MappingStore>,
        records: Arc<dyn TollRecordStore>,
        candidates: Arc<dyn CandidateSource>,
        config: &PipelineConfig,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            mappings,
            records,
            candidates,
            scorer: MatchScorer::new(config.match_window_secs)?,
            active_policy: config.active_mapping_policy,
            delete_policy: config.delete_policy,
        })
    }

    pub async fn create_mapping(&self, input: CreateMapping) -> Result<Mapping, CoreError> {
        let input = input.normalized()?;
        if self.records.get_record_by_id(input.toll_record_id).await?.is_none() {
            return Err(CoreError::not_found("TollRecord", input.toll_record_id));
        }
        let replaced = if input.status == MappingStatus::Active {
            self.active_to_replace(input.toll_record_id, None).await?
        } else {
            Vec::new()
        };

        let mapping = self.mappings.create_mapping(&input, &replaced).await?;
        log_replaced(&replaced, mapping.toll_record_id);
        tracing::info!(
            mapping_id = mapping.id,
            toll_record_id = mapping.toll_record_id,
            status = %mapping.status,
            confidence = mapping.confidence,
            "Mapping created",
        );
        Ok(mapping)
    }

    pub async fn get_mapping(&self, id: DbId) -> Result<Mapping, CoreError> {
        validate_id("mapping", id)?;
        self.mappings
            .get_mapping(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Mapping", id))
    }

    pub async fn list_mappings(
        &self,
        filter: &MappingFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<Mapping>, CoreError> {
        filter.validate()?;
        self.mappings.list_mappings(filter, page, sort).await
    }

    pub async fn update_mapping(&self, id: DbId, input: UpdateMapping) -> Result<Mapping, CoreError> {
        validate_id("mapping", id)?;
        let input = input.normalized()?;
        let existing = self.get_mapping(id).await?;
        let replaced = if input.status == Some(MappingStatus::Active) {
            self.active_to_replace(existing.toll_record_id, Some(id))
                .await?
        } else {
            Vec::new()
        };

        let mapping = self
            .mappings
            .update_mapping(id, &input, &replaced)
            .await?
            .ok_or_else(|| CoreError::not_found("Mapping", id))?;
        log_replaced(&replaced, mapping.toll_record_id);
        tracing::info!(mapping_id = id, status = %mapping.status, "Mapping updated");
        Ok(mapping)
    }

    /// Delete a mapping; a missing id follows the configured [`DeletePolicy`].
    pub async fn delete_mapping(&self, id: DbId) -> Result<(), CoreError> {
        validate_id("mapping", id)?;
        let deleted = self.mappings.delete_mapping(id).await?;
        if deleted {
            tracing::info!(mapping_id = id, "Mapping deleted");
        }
        self.delete_policy.check(deleted, "Mapping", id)
    }

    /// Change only the confidence; status and everything else stay.
    pub async fn update_confidence_score(&self, id: DbId, confidence: f64) -> Result<Mapping, CoreError> {
        validate_id("mapping", id)?;
        validate_confidence(confidence)?;
        let input = UpdateMapping {
            confidence: Some(confidence),
            ..Default::default()
        };
        self.mappings
            .update_mapping(id, &input, &[])
            .await?
            .ok_or_else(|| CoreError::not_found("Mapping", id))
    }

    /// Score external candidates for a toll record.
    ///
    /// Results are at or above `threshold`, ordered by descending
    /// confidence and then ascending entity id.
    pub async fn find_potential_matches(
        &self,
        toll_record_id: DbId,
        threshold: f64,
    ) -> Result<Vec<PotentialMatch>, CoreError> {
        validate_id("toll record", toll_record_id)?;
        validate_confidence(threshold)?;
        let record = self
            .records
            .get_record_by_id(toll_record_id)
            .await?
            .ok_or_else(|| CoreError::not_found("TollRecord", toll_record_id))?;

        let window = Duration::from_secs(self.scorer.window_secs().unsigned_abs());
        let candidates = self.candidates.candidates_for(&record, window).await?;
        let matches = self.scorer.rank(&record, &candidates, threshold)?;
        tracing::debug!(
            toll_record_id,
            candidates = candidates.len(),
            matches = matches.len(),
            threshold,
            "Potential matches scored",
        );
        Ok(matches)
    }

    /// Apply the active-mapping policy before `toll_record_id` gains an
    /// ACTIVE mapping. `updating` is the mapping being changed, if any.
    ///
    /// Returns the ACTIVE mappings the write must deactivate; the store does
    /// that in the same atomic step as the write itself.
    async fn active_to_replace(&self, toll_record_id: DbId, updating: Option<DbId>) -> Result<Vec<DbId>, CoreError> {
        let existing = self.mappings.list_active_for_record(toll_record_id).await?;
        match self.active_policy.resolve(toll_record_id, &existing, updating)? {
            ActiveResolution::Proceed => Ok(Vec::new()),
            ActiveResolution::Deactivate(ids) => Ok(ids),
        }
    }
}

fn log_replaced(replaced: &[DbId], toll_record_id: DbId) {
    for &mapping_id in replaced {
        tracing::info!(mapping_id, toll_record_id, "Replaced active mapping");
    }
}
