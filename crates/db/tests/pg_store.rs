//! Integration tests for the PostgreSQL store.
//!
//! These need a live database (`DATABASE_URL`) and are ignored by default:
//! `cargo test -p tollsync-db -- --ignored`.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use tollsync_core::error::CoreError;
use tollsync_core::import_session::{
    ErrorLogEntry, ImportSession, ImportStatus, NewImportSession, RowErrorKind, SessionFilter,
    SESSION_SORT_FIELDS,
};
use tollsync_core::mapping::{
    CreateMapping, MappingFilter, MappingStatus, UpdateMapping, MAPPING_SORT_FIELDS,
};
use tollsync_core::pagination::{PageRequest, SortSpec};
use tollsync_core::storage::{HealthProbe, ImportSessionStore, MappingStore, TollRecordStore};
use tollsync_core::toll_record::{NewTollRecord, RecordFilter, RECORD_SORT_FIELDS};
use tollsync_db::PgStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn record(vehicle: &str, amount: i64) -> NewTollRecord {
    NewTollRecord::new(
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
        "Tokyo IC",
        "Yokohama IC",
        amount,
        vehicle,
        "C-1",
        None,
        None,
    )
    .unwrap()
}

fn mapping(toll_record_id: i64, status: MappingStatus) -> CreateMapping {
    CreateMapping {
        toll_record_id,
        mapping_type: "automatic".into(),
        mapped_entity_id: 42,
        mapped_entity_type: "dtako_trip".into(),
        confidence: 0.8,
        status,
        created_by: Some("tester".into()),
        metadata: BTreeMap::from([("source".to_string(), "test".to_string())]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn health_check_succeeds(pool: PgPool) {
    PgStore::new(pool).ping().await.unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_hash_is_conflict(pool: PgPool) {
    let store = PgStore::new(pool);
    let input = record("V-1", 1320);
    store.create_record(&input).await.unwrap();

    let err = store.create_record(&input).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)), "got {err:?}");

    let other = record("V-2", 1320);
    let known = store
        .batch_check_hashes_exist(&[input.hash.clone(), other.hash.clone()])
        .await
        .unwrap();
    assert_eq!(known[&input.hash], true);
    assert_eq!(known[&other.hash], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn record_list_filters_and_counts(pool: PgPool) {
    let store = PgStore::new(pool);
    store.create_record(&record("V-100", 1)).await.unwrap();
    store.create_record(&record("V-200", 2)).await.unwrap();
    store.create_record(&record("X-300", 3)).await.unwrap();

    let sort = SortSpec::parse(None, None, RECORD_SORT_FIELDS).unwrap();
    let filter = RecordFilter {
        vehicle_id: Some("V-".into()),
        partial_match: true,
        ..Default::default()
    };
    let page = store
        .list_records(&filter, &PageRequest::new(Some(1), Some(1)).unwrap(), &sort)
        .await
        .unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.items.len(), 1);

    let exact = RecordFilter {
        vehicle_id: Some("V-".into()),
        ..Default::default()
    };
    let page = store
        .list_records(&exact, &PageRequest::default(), &sort)
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn mapping_partial_update_keeps_other_fields(pool: PgPool) {
    let store = PgStore::new(pool);
    let rec = store.create_record(&record("V-1", 1)).await.unwrap();
    let created = store
        .create_mapping(&mapping(rec.id, MappingStatus::Pending), &[])
        .await
        .unwrap();

    let update = UpdateMapping {
        confidence: Some(0.3),
        ..Default::default()
    };
    let updated = store
        .update_mapping(created.id, &update, &[])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.confidence, 0.3);
    assert_eq!(updated.status, MappingStatus::Pending);
    assert_eq!(updated.metadata, created.metadata);

    let sort = SortSpec::parse(None, None, MAPPING_SORT_FIELDS).unwrap();
    let none = MappingFilter {
        mapped_entity_type: Some("nothing".into()),
        ..Default::default()
    };
    let page = store
        .list_mappings(&none, &PageRequest::default(), &sort)
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);

    assert!(store.delete_mapping(created.id).await.unwrap());
    assert!(!store.delete_mapping(created.id).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_mapping_target_is_conflict(pool: PgPool) {
    let store = PgStore::new(pool);
    let rec = store.create_record(&record("V-1", 1)).await.unwrap();
    store
        .create_mapping(&mapping(rec.id, MappingStatus::Pending), &[])
        .await
        .unwrap();

    let err = store
        .create_mapping(&mapping(rec.id, MappingStatus::Rejected), &[])
        .await
        .unwrap_err();
    match err {
        CoreError::Conflict(msg) => assert!(msg.contains("uq_mappings_target")),
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn replacement_is_atomic_with_the_write(pool: PgPool) {
    let store = PgStore::new(pool);
    let rec = store.create_record(&record("V-1", 1)).await.unwrap();
    let current = store
        .create_mapping(&mapping(rec.id, MappingStatus::Active), &[])
        .await
        .unwrap();

    // Same target: the insert fails, so the deactivation must roll back.
    let err = store
        .create_mapping(&mapping(rec.id, MappingStatus::Active), &[current.id])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    let active = store.list_active_for_record(rec.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, current.id);

    // Unknown id: nothing is deactivated either.
    let update = UpdateMapping {
        status: Some(MappingStatus::Active),
        ..Default::default()
    };
    assert!(store
        .update_mapping(999_999, &update, &[current.id])
        .await
        .unwrap()
        .is_none());
    assert_eq!(store.list_active_for_record(rec.id).await.unwrap().len(), 1);

    let mut next = mapping(rec.id, MappingStatus::Active);
    next.mapped_entity_id = 43;
    let replacement = store.create_mapping(&next, &[current.id]).await.unwrap();
    let active = store.list_active_for_record(rec.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, replacement.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn finished_session_is_not_overwritten(pool: PgPool) {
    let store = PgStore::new(pool);
    let input = NewImportSession::new("corporate", "acct-1", "may.csv", 10, None).unwrap();
    let mut session = ImportSession::new("session-2".into(), input, Utc::now());
    store.persist_session(&session).await.unwrap();

    let mut cancelled = session.clone();
    cancelled.transition(ImportStatus::Cancelled, Utc::now()).unwrap();
    store.update_session(&cancelled).await.unwrap();

    session.transition(ImportStatus::Processing, Utc::now()).unwrap();
    let err = store.update_session(&session).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
    let loaded = store.get_session("session-2").await.unwrap().unwrap();
    assert_eq!(loaded.status, ImportStatus::Cancelled);

    let mut unknown = session.clone();
    unknown.id = "session-missing".into();
    assert!(matches!(
        store.update_session(&unknown).await,
        Err(CoreError::NotFound { .. })
    ));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn session_round_trips_with_error_log(pool: PgPool) {
    let store = PgStore::new(pool);
    let input = NewImportSession::new("corporate", "acct-1", "may.csv", 10, None).unwrap();
    let mut session = ImportSession::new("session-1".into(), input, Utc::now());
    store.persist_session(&session).await.unwrap();

    session.transition(ImportStatus::Processing, Utc::now()).unwrap();
    session.add_discovered_rows(1);
    session.record_row_error(
        ErrorLogEntry {
            row_number: 1,
            error_type: RowErrorKind::InvalidAmount,
            error_message: "amount 'abc' is not a non-negative integer".into(),
            raw_data: "2024-03-01,08:15:00,T,Y,abc,V,C".into(),
        },
        100,
    );
    session.transition(ImportStatus::Completed, Utc::now()).unwrap();
    store.update_session(&session).await.unwrap();

    let loaded = store.get_session("session-1").await.unwrap().unwrap();
    assert_eq!(loaded.status, ImportStatus::Completed);
    assert_eq!(loaded.error_rows, 1);
    assert_eq!(loaded.error_log, session.error_log);
    assert!(loaded.completed_at.is_some());

    let sort = SortSpec::parse(None, None, SESSION_SORT_FIELDS).unwrap();
    let filter = SessionFilter {
        status: Some(ImportStatus::Failed),
        ..Default::default()
    };
    let page = store
        .list_sessions(&filter, &PageRequest::default(), &sort)
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);
}
