//! In-memory storage collaborator.
//!
//! Implements every storage capability trait with the same observable
//! semantics as the PostgreSQL store: unique content hashes and mapping
//! targets, referential checks on mapping creation, atomic replacement of
//! active mappings, identical filtering and ordering. Used by
//! tests and for running the service without a database.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tollsync_core::error::CoreError;
use tollsync_core::import_session::{ImportSession, SessionFilter};
use tollsync_core::mapping::{CreateMapping, Mapping, MappingFilter, MappingStatus, UpdateMapping};
use tollsync_core::matching::ExternalCandidate;
use tollsync_core::pagination::{Page, PageRequest, SortDirection, SortSpec};
use tollsync_core::storage::{
    CandidateSource, HealthProbe, ImportSessionStore, MappingStore, TollRecordStore,
};
use tollsync_core::toll_record::{NewTollRecord, RecordFilter, TollRecord};
use tollsync_core::types::{DbId, Timestamp};

#[derive(Default)]
struct Tables {
    records: BTreeMap<DbId, TollRecord>,
    next_record_id: DbId,
    mappings: BTreeMap<DbId, Mapping>,
    next_mapping_id: DbId,
    sessions: HashMap<String, ImportSession>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
    hash_checks: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make record and mapping writes and health checks fail as if storage
    /// were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Number of `batch_check_hashes_exist` calls served so far.
    pub fn hash_check_calls(&self) -> usize {
        self.hash_checks.load(AtomicOrdering::SeqCst)
    }

    pub async fn record_count(&self) -> usize {
        self.tables.read().await.records.len()
    }

    pub async fn mapping_count(&self) -> usize {
        self.tables.read().await.mappings.len()
    }

    fn check_available(&self) -> Result<(), CoreError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(CoreError::Internal("A storage error occurred".into()));
        }
        Ok(())
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn page_of<T: Clone>(mut items: Vec<T>, page: &PageRequest, cmp: impl Fn(&T, &T) -> Ordering) -> Page<T> {
    items.sort_by(cmp);
    let total_count = items.len() as i64;
    Page {
        items: page.slice(&items),
        total_count,
    }
}

fn unique_hash_conflict() -> CoreError {
    CoreError::Conflict("Duplicate value violates unique constraint: uq_toll_records_hash".into())
}

fn unique_target_conflict() -> CoreError {
    CoreError::Conflict("Duplicate value violates unique constraint: uq_mappings_target".into())
}

fn same_target(a: &Mapping, b: &Mapping) -> bool {
    a.toll_record_id == b.toll_record_id
        && a.mapping_type == b.mapping_type
        && a.mapped_entity_type == b.mapped_entity_type
        && a.mapped_entity_id == b.mapped_entity_id
}

fn deactivate_all(tables: &mut Tables, ids: &[DbId], now: Timestamp) {
    for id in ids {
        if let Some(mapping) = tables.mappings.get_mut(id) {
            mapping.status = MappingStatus::Inactive;
            mapping.updated_at = now;
        }
    }
}

#[async_trait]
impl TollRecordStore for MemoryStore {
    async fn create_record(&self, record: &NewTollRecord) -> Result<TollRecord, CoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables.records.values().any(|r| r.hash == record.hash) {
            return Err(unique_hash_conflict());
        }
        tables.next_record_id += 1;
        let now = Utc::now();
        let stored = TollRecord {
            id: tables.next_record_id,
            hash: record.hash.clone(),
            date: record.date,
            time: record.time,
            entry_point: record.entry_point.clone(),
            exit_point: record.exit_point.clone(),
            amount: record.amount,
            vehicle_id: record.vehicle_id.clone(),
            card_id: record.card_id.clone(),
            external_ref: record.external_ref.clone(),
            external_row_id: record.external_row_id.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn batch_check_hashes_exist(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, bool>, CoreError> {
        self.check_available()?;
        self.hash_checks.fetch_add(1, AtomicOrdering::SeqCst);
        let tables = self.tables.read().await;
        Ok(hashes
            .iter()
            .map(|h| {
                let exists = tables.records.values().any(|r| &r.hash == h);
                (h.clone(), exists)
            })
            .collect())
    }

    async fn get_record_by_id(&self, id: DbId) -> Result<Option<TollRecord>, CoreError> {
        Ok(self.tables.read().await.records.get(&id).cloned())
    }

    async fn list_records(
        &self,
        filter: &RecordFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<TollRecord>, CoreError> {
        let tables = self.tables.read().await;
        let items: Vec<TollRecord> = tables
            .records
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        let field = sort.field;
        Ok(page_of(items, page, |a, b| {
            let primary = match field {
                "date" => (a.date, a.time).cmp(&(b.date, b.time)),
                "amount" => a.amount.cmp(&b.amount),
                "created_at" => a.created_at.cmp(&b.created_at),
                _ => Ordering::Equal,
            };
            directed(primary.then(a.id.cmp(&b.id)), sort.direction)
        }))
    }

    async fn update_record(
        &self,
        id: DbId,
        record: &NewTollRecord,
    ) -> Result<Option<TollRecord>, CoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if tables
            .records
            .values()
            .any(|r| r.id != id && r.hash == record.hash)
        {
            return Err(unique_hash_conflict());
        }
        let Some(stored) = tables.records.get_mut(&id) else {
            return Ok(None);
        };
        stored.hash = record.hash.clone();
        stored.date = record.date;
        stored.time = record.time;
        stored.entry_point = record.entry_point.clone();
        stored.exit_point = record.exit_point.clone();
        stored.amount = record.amount;
        stored.vehicle_id = record.vehicle_id.clone();
        stored.card_id = record.card_id.clone();
        stored.external_ref = record.external_ref.clone();
        stored.external_row_id = record.external_row_id.clone();
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn delete_record(&self, id: DbId) -> Result<bool, CoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let removed = tables.records.remove(&id).is_some();
        if removed {
            tables.mappings.retain(|_, m| m.toll_record_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn create_mapping(
        &self,
        input: &CreateMapping,
        deactivate: &[DbId],
    ) -> Result<Mapping, CoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.records.contains_key(&input.toll_record_id) {
            return Err(CoreError::not_found("TollRecord", input.toll_record_id));
        }
        let now = Utc::now();
        let mapping = Mapping {
            id: tables.next_mapping_id + 1,
            toll_record_id: input.toll_record_id,
            mapping_type: input.mapping_type.clone(),
            mapped_entity_id: input.mapped_entity_id,
            mapped_entity_type: input.mapped_entity_type.clone(),
            confidence: input.confidence,
            status: input.status,
            metadata: input.metadata.clone(),
            created_by: input.created_by.clone(),
            created_at: now,
            updated_at: now,
        };
        if tables.mappings.values().any(|m| same_target(m, &mapping)) {
            return Err(unique_target_conflict());
        }

        deactivate_all(&mut tables, deactivate, now);
        tables.next_mapping_id = mapping.id;
        tables.mappings.insert(mapping.id, mapping.clone());
        Ok(mapping)
    }

    async fn get_mapping(&self, id: DbId) -> Result<Option<Mapping>, CoreError> {
        Ok(self.tables.read().await.mappings.get(&id).cloned())
    }

    async fn list_mappings(
        &self,
        filter: &MappingFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<Mapping>, CoreError> {
        let tables = self.tables.read().await;
        let items: Vec<Mapping> = tables
            .mappings
            .values()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        let field = sort.field;
        Ok(page_of(items, page, |a, b| {
            let primary = match field {
                "created_at" => a.created_at.cmp(&b.created_at),
                "updated_at" => a.updated_at.cmp(&b.updated_at),
                "confidence" => a.confidence.total_cmp(&b.confidence),
                _ => Ordering::Equal,
            };
            directed(primary.then(a.id.cmp(&b.id)), sort.direction)
        }))
    }

    async fn update_mapping(
        &self,
        id: DbId,
        input: &UpdateMapping,
        deactivate: &[DbId],
    ) -> Result<Option<Mapping>, CoreError> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let Some(current) = tables.mappings.get(&id) else {
            return Ok(None);
        };
        let now = Utc::now();
        let mut updated = current.clone();
        input.apply_to(&mut updated, now);
        if tables
            .mappings
            .values()
            .any(|m| m.id != id && same_target(m, &updated))
        {
            return Err(unique_target_conflict());
        }

        deactivate_all(&mut tables, deactivate, now);
        tables.mappings.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_mapping(&self, id: DbId) -> Result<bool, CoreError> {
        self.check_available()?;
        Ok(self.tables.write().await.mappings.remove(&id).is_some())
    }

    async fn list_active_for_record(&self, toll_record_id: DbId) -> Result<Vec<Mapping>, CoreError> {
        Ok(self
            .tables
            .read()
            .await
            .mappings
            .values()
            .filter(|m| m.toll_record_id == toll_record_id && m.status == MappingStatus::Active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ImportSessionStore for MemoryStore {
    async fn persist_session(&self, session: &ImportSession) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.id) {
            return Err(CoreError::Conflict(format!(
                "Import session '{}' already exists",
                session.id
            )));
        }
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &ImportSession) -> Result<(), CoreError> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(&session.id) {
            Some(stored) if stored.is_terminal() => Err(ImportSession::finished_conflict(&session.id)),
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(CoreError::not_found("ImportSession", &session.id)),
        }
    }

    async fn get_session(&self, id: &str) -> Result<Option<ImportSession>, CoreError> {
        Ok(self.tables.read().await.sessions.get(id).cloned())
    }

    async fn list_sessions(
        &self,
        filter: &SessionFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<ImportSession>, CoreError> {
        let tables = self.tables.read().await;
        let items: Vec<ImportSession> = tables
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        let field = sort.field;
        Ok(page_of(items, page, |a, b| {
            let primary = match field {
                "created_at" => a.created_at.cmp(&b.created_at),
                "started_at" => a.started_at.cmp(&b.started_at),
                "completed_at" => a.completed_at.cmp(&b.completed_at),
                "file_name" => a.file_name.cmp(&b.file_name),
                "total_rows" => a.total_rows.cmp(&b.total_rows),
                _ => Ordering::Equal,
            };
            directed(primary.then_with(|| a.id.cmp(&b.id)), sort.direction)
        }))
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    async fn ping(&self) -> Result<(), CoreError> {
        self.check_available()
    }
}

/// A fixed candidate pool, filtered the way the database query filters.
#[derive(Debug, Clone, Default)]
pub struct StaticCandidates {
    candidates: Vec<ExternalCandidate>,
}

impl StaticCandidates {
    pub fn new(candidates: Vec<ExternalCandidate>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CandidateSource for StaticCandidates {
    async fn candidates_for(
        &self,
        record: &TollRecord,
        window: Duration,
    ) -> Result<Vec<ExternalCandidate>, CoreError> {
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
        let at = record.occurred_at();
        Ok(self
            .candidates
            .iter()
            .filter(|c| {
                c.card_id.as_deref() == Some(record.card_id.as_str())
                    || c.vehicle_id.as_deref() == Some(record.vehicle_id.as_str())
                    || (c.occurred_at - at).num_seconds().abs() <= window_secs
            })
            .cloned()
            .collect())
    }
}
