//! PostgreSQL implementation of the `tollsync_core::storage` traits.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tollsync_core::error::CoreError;
use tollsync_core::import_session::{ImportSession, SessionFilter};
use tollsync_core::mapping::{CreateMapping, Mapping, MappingFilter, UpdateMapping};
use tollsync_core::matching::ExternalCandidate;
use tollsync_core::pagination::{Page, PageRequest, SortSpec};
use tollsync_core::storage::{
    CandidateSource, HealthProbe, ImportSessionStore, MappingStore, TollRecordStore,
};
use tollsync_core::toll_record::{NewTollRecord, RecordFilter, TollRecord};
use tollsync_core::types::DbId;

use crate::repositories::{ExternalTripRepo, ImportSessionRepo, MappingRepo, TollRecordRepo};
use crate::DbPool;

/// Storage collaborator backed by a connection pool. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map a sqlx error into the domain taxonomy.
///
/// Unique violations on `uq_*` constraints become `Conflict`, foreign-key
/// violations become `NotFound`, and everything
/// else is logged and reported as a generic internal error.
pub fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown");
        match db_err.code().as_deref() {
            Some("23505") if constraint.starts_with("uq_") => {
                return CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ));
            }
            Some("23503") => {
                return CoreError::not_found("Referenced record", constraint);
            }
            _ => {}
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal("A storage error occurred".into())
}

fn into_page<R, T>(rows: Vec<R>, total_count: i64) -> Result<Page<T>, CoreError>
where
    T: TryFrom<R, Error = CoreError>,
{
    let items = rows
        .into_iter()
        .map(T::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page { items, total_count })
}

#[async_trait]
impl TollRecordStore for PgStore {
    async fn create_record(&self, record: &NewTollRecord) -> Result<TollRecord, CoreError> {
        TollRecordRepo::create(&self.pool, record)
            .await
            .map(TollRecord::from)
            .map_err(map_db_error)
    }

    async fn batch_check_hashes_exist(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, bool>, CoreError> {
        let mut result: HashMap<String, bool> =
            hashes.iter().map(|h| (h.clone(), false)).collect();
        if hashes.is_empty() {
            return Ok(result);
        }
        let existing = TollRecordRepo::existing_hashes(&self.pool, hashes)
            .await
            .map_err(map_db_error)?;
        for hash in existing {
            result.insert(hash, true);
        }
        Ok(result)
    }

    async fn get_record_by_id(&self, id: DbId) -> Result<Option<TollRecord>, CoreError> {
        TollRecordRepo::find_by_id(&self.pool, id)
            .await
            .map(|row| row.map(TollRecord::from))
            .map_err(map_db_error)
    }

    async fn list_records(
        &self,
        filter: &RecordFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<TollRecord>, CoreError> {
        let (rows, total_count) = TollRecordRepo::list(&self.pool, filter, page, sort)
            .await
            .map_err(map_db_error)?;
        Ok(Page {
            items: rows.into_iter().map(TollRecord::from).collect(),
            total_count,
        })
    }

    async fn update_record(
        &self,
        id: DbId,
        record: &NewTollRecord,
    ) -> Result<Option<TollRecord>, CoreError> {
        TollRecordRepo::update(&self.pool, id, record)
            .await
            .map(|row| row.map(TollRecord::from))
            .map_err(map_db_error)
    }

    async fn delete_record(&self, id: DbId) -> Result<bool, CoreError> {
        TollRecordRepo::delete(&self.pool, id)
            .await
            .map_err(map_db_error)
    }
}

#[async_trait]
impl MappingStore for PgStore {
    async fn create_mapping(
        &self,
        input: &CreateMapping,
        deactivate: &[DbId],
    ) -> Result<Mapping, CoreError> {
        let row = MappingRepo::create(&self.pool, input, deactivate)
            .await
            .map_err(map_db_error)?;
        Mapping::try_from(row)
    }

    async fn get_mapping(&self, id: DbId) -> Result<Option<Mapping>, CoreError> {
        MappingRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_db_error)?
            .map(Mapping::try_from)
            .transpose()
    }

    async fn list_mappings(
        &self,
        filter: &MappingFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<Mapping>, CoreError> {
        let (rows, total_count) = MappingRepo::list(&self.pool, filter, page, sort)
            .await
            .map_err(map_db_error)?;
        into_page(rows, total_count)
    }

    async fn update_mapping(
        &self,
        id: DbId,
        input: &UpdateMapping,
        deactivate: &[DbId],
    ) -> Result<Option<Mapping>, CoreError> {
        MappingRepo::update(&self.pool, id, input, deactivate)
            .await
            .map_err(map_db_error)?
            .map(Mapping::try_from)
            .transpose()
    }

    async fn delete_mapping(&self, id: DbId) -> Result<bool, CoreError> {
        MappingRepo::delete(&self.pool, id)
            .await
            .map_err(map_db_error)
    }

    async fn list_active_for_record(&self, toll_record_id: DbId) -> Result<Vec<Mapping>, CoreError> {
        MappingRepo::list_active_for_record(&self.pool, toll_record_id)
            .await
            .map_err(map_db_error)?
            .into_iter()
            .map(Mapping::try_from)
            .collect()
    }
}

#[async_trait]
impl ImportSessionStore for PgStore {
    async fn persist_session(&self, session: &ImportSession) -> Result<(), CoreError> {
        ImportSessionRepo::insert(&self.pool, session)
            .await
            .map_err(map_db_error)
    }

    async fn update_session(&self, session: &ImportSession) -> Result<(), CoreError> {
        let updated = ImportSessionRepo::update(&self.pool, session)
            .await
            .map_err(map_db_error)?;
        if updated {
            return Ok(());
        }
        match ImportSessionRepo::find_by_id(&self.pool, &session.id)
            .await
            .map_err(map_db_error)?
        {
            Some(_) => Err(ImportSession::finished_conflict(&session.id)),
            None => Err(CoreError::not_found("ImportSession", &session.id)),
        }
    }

    async fn get_session(&self, id: &str) -> Result<Option<ImportSession>, CoreError> {
        ImportSessionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(map_db_error)?
            .map(ImportSession::try_from)
            .transpose()
    }

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<ImportSession>, CoreError> {
        let (rows, total_count) = ImportSessionRepo::list(&self.pool, filter, page, sort)
            .await
            .map_err(map_db_error)?;
        into_page(rows, total_count)
    }
}

#[async_trait]
impl CandidateSource for PgStore {
    async fn candidates_for(
        &self,
        record: &TollRecord,
        window: Duration,
    ) -> Result<Vec<ExternalCandidate>, CoreError> {
        let window = chrono::Duration::from_std(window)
            .map_err(|_| CoreError::Validation("match time window is too large".into()))?;
        let at = record.occurred_at();
        let rows = ExternalTripRepo::candidates(
            &self.pool,
            &record.card_id,
            &record.vehicle_id,
            at - window,
            at + window,
        )
        .await
        .map_err(map_db_error)?;
        Ok(rows.into_iter().map(ExternalCandidate::from).collect())
    }
}

#[async_trait]
impl HealthProbe for PgStore {
    async fn ping(&self) -> Result<(), CoreError> {
        crate::health_check(&self.pool)
            .await
            .map_err(map_db_error)
    }
}
