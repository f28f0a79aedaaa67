mod common;

use assert_matches::assert_matches;
use common::{csv, harness, harness_with, request, row, HEADER};
use tollsync_core::error::CoreError;
use tollsync_core::import_session::{
    ImportSession, ImportStatus, RowErrorKind, SessionFilter, SESSION_SORT_FIELDS,
};
use tollsync_core::pagination::{PageRequest, SortSpec};
use tollsync_pipeline::PipelineConfig;

fn assert_counters_balanced(session: &ImportSession) {
    assert_eq!(
        session.success_rows + session.error_rows + session.duplicate_rows,
        session.processed_rows
    );
    assert!(session.processed_rows <= session.total_rows);
}

#[tokio::test]
async fn bad_amount_on_fourth_row_is_logged() {
    let h = harness();
    let content = format!(
        "{}{}{}{}2024-03-01,08:15:00,Tokyo IC,Yokohama IC,abc,V-9,C-9,\n",
        HEADER,
        row(1),
        row(2),
        row(3)
    );

    let session = h.coordinator.start_import(request(&content)).await.unwrap();

    assert_eq!(session.status, ImportStatus::Completed);
    assert_eq!(session.total_rows, 4);
    assert_eq!(session.success_rows, 3);
    assert_eq!(session.error_rows, 1);
    assert_eq!(session.duplicate_rows, 0);
    assert_eq!(session.error_log.len(), 1);
    assert_eq!(session.error_log[0].row_number, 4);
    assert_eq!(session.error_log[0].error_type, RowErrorKind::InvalidAmount);
    assert!(session.completed_at.is_some());
    assert_counters_balanced(&session);
    assert_eq!(h.store.record_count().await, 3);
}

#[tokio::test]
async fn reimport_counts_every_row_as_duplicate() {
    let h = harness();
    let content = csv(&[row(1), row(2), row(3)]);

    let first = h.coordinator.start_import(request(&content)).await.unwrap();
    assert_eq!(first.success_rows, 3);

    let second = h.coordinator.start_import(request(&content)).await.unwrap();
    assert_eq!(second.status, ImportStatus::Completed);
    assert_eq!(second.duplicate_rows, second.total_rows);
    assert_eq!(second.success_rows, 0);
    assert_ne!(first.id, second.id);
    assert_eq!(h.store.record_count().await, 3);
}

#[tokio::test]
async fn repeated_row_within_one_import_is_duplicate() {
    let h = harness();
    let content = csv(&[row(1), row(1), row(2)]);

    let session = h.coordinator.start_import(request(&content)).await.unwrap();
    assert_eq!(session.success_rows, 2);
    assert_eq!(session.duplicate_rows, 1);
    assert_counters_balanced(&session);
}

#[tokio::test]
async fn whitespace_variants_hash_identically() {
    let h = harness();
    let content = format!(
        "{HEADER}2024-03-01,08:15:00,Tokyo IC,Yokohama IC,100,V-1,C-1,\n\
         2024/03/01,08:15:00,  Tokyo IC ,Yokohama IC,100, V-1,C-1 ,\n"
    );
    let session = h.coordinator.start_import(request(&content)).await.unwrap();
    assert_eq!(session.success_rows, 1);
    assert_eq!(session.duplicate_rows, 1);
}

#[tokio::test]
async fn one_hash_check_per_batch() {
    let config = PipelineConfig {
        batch_size: 2,
        ..Default::default()
    };
    let h = harness_with(config, Vec::new());
    let content = csv(&[row(1), row(2), row(3), row(4), row(5)]);

    let session = h.coordinator.start_import(request(&content)).await.unwrap();
    assert_eq!(session.success_rows, 5);
    assert_eq!(h.store.hash_check_calls(), 3);
}

#[tokio::test]
async fn missing_header_columns_fail_the_session() {
    let h = harness();
    let content = "date,time,amount\n2024-03-01,08:00:00,100\n";

    let err = h.coordinator.start_import(request(content)).await.unwrap_err();
    assert_matches!(&err, CoreError::Validation(msg) if msg.contains("entry_point"));

    let filter = SessionFilter {
        status: Some(ImportStatus::Failed),
        ..Default::default()
    };
    let sort = SortSpec::parse(None, None, SESSION_SORT_FIELDS).unwrap();
    let page = h
        .coordinator
        .list_sessions(&filter, &PageRequest::default(), &sort)
        .await
        .unwrap();
    assert_eq!(page.total_count, 1);
    let failed = &page.items[0];
    assert_eq!(failed.processed_rows, 0);
    assert_eq!(failed.error_log[0].row_number, 0);
    assert_eq!(failed.error_log[0].error_type, RowErrorKind::Header);
    assert!(failed.completed_at.is_some());
    assert_eq!(h.store.record_count().await, 0);
}

#[tokio::test]
async fn header_only_payload_fails() {
    let h = harness();
    let session = h.coordinator.start_import(request(HEADER)).await.unwrap();
    assert_eq!(session.status, ImportStatus::Failed);
    assert_eq!(session.total_rows, 0);
    assert!(session.completed_at.is_some());
}

#[tokio::test]
async fn all_rows_invalid_still_completes() {
    let h = harness();
    let content = format!("{HEADER}not-a-date,08:00:00,A,B,1,V,C,\n2024-03-01,25:00:00,A,B,1,V,C,\n");
    let session = h.coordinator.start_import(request(&content)).await.unwrap();
    assert_eq!(session.status, ImportStatus::Completed);
    assert_eq!(session.error_rows, 2);
    assert_eq!(session.error_log[0].error_type, RowErrorKind::InvalidDate);
    assert_eq!(session.error_log[1].error_type, RowErrorKind::InvalidTime);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_a_session_exists() {
    let h = harness();
    let mut empty_content = request("");
    empty_content.content.clear();
    assert_matches!(
        h.coordinator.start_import(empty_content).await,
        Err(CoreError::Validation(_))
    );

    let mut no_account = request(HEADER);
    no_account.account_id = "  ".into();
    assert_matches!(
        h.coordinator.start_import(no_account).await,
        Err(CoreError::Validation(_))
    );

    let sort = SortSpec::parse(None, None, SESSION_SORT_FIELDS).unwrap();
    let page = h
        .coordinator
        .list_sessions(&SessionFilter::default(), &PageRequest::default(), &sort)
        .await
        .unwrap();
    assert_eq!(page.total_count, 0);
}

#[tokio::test]
async fn error_log_is_capped() {
    let config = PipelineConfig {
        max_error_log: 2,
        ..Default::default()
    };
    let h = harness_with(config, Vec::new());
    let bad = "2024-03-01,08:00:00,A,B,x,V,C,\n";
    let content = format!("{HEADER}{bad}{bad}{bad}{bad}{bad}");

    let session = h.coordinator.start_import(request(&content)).await.unwrap();
    assert_eq!(session.error_rows, 5);
    assert_eq!(session.error_log.len(), 2);
}

#[tokio::test]
async fn storage_failure_fails_the_session() {
    let h = harness();
    h.store.set_unavailable(true);

    let err = h
        .coordinator
        .start_import(request(&csv(&[row(1)])))
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Internal(_));

    let sort = SortSpec::parse(None, None, SESSION_SORT_FIELDS).unwrap();
    let page = h
        .coordinator
        .list_sessions(&SessionFilter::default(), &PageRequest::default(), &sort)
        .await
        .unwrap();
    let session = &page.items[0];
    assert_eq!(session.status, ImportStatus::Failed);
    assert!(session
        .error_log
        .iter()
        .any(|e| e.error_type == RowErrorKind::Storage));
    assert_counters_balanced(session);
}

#[tokio::test]
async fn get_and_cancel_follow_the_state_machine() {
    let h = harness();
    let session = h
        .coordinator
        .start_import(request(&csv(&[row(1)])))
        .await
        .unwrap();

    let loaded = h.coordinator.get_session(&session.id).await.unwrap();
    assert_eq!(loaded, session);

    assert_matches!(
        h.coordinator.cancel_session(&session.id).await,
        Err(CoreError::Validation(_))
    );
    assert_eq!(
        h.coordinator.get_session(&session.id).await.unwrap().status,
        ImportStatus::Completed
    );

    assert_matches!(
        h.coordinator.get_session("missing").await,
        Err(CoreError::NotFound { .. })
    );
    assert_matches!(
        h.coordinator.cancel_session("missing").await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn list_sessions_filters_sorts_and_pages() {
    let h = harness();
    for n in 0..3 {
        let mut req = request(&csv(&[row(n)]));
        req.file_name = format!("file-{n}.csv");
        h.coordinator.start_import(req).await.unwrap();
    }

    let sort = SortSpec::parse(Some("file_name"), Some("asc"), SESSION_SORT_FIELDS).unwrap();
    let page = h
        .coordinator
        .list_sessions(
            &SessionFilter::default(),
            &PageRequest::new(Some(2), Some(2)).unwrap(),
            &sort,
        )
        .await
        .unwrap();
    assert_eq!(page.total_count, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].file_name, "file-2.csv");

    let none = SessionFilter {
        account_id: Some("nobody".into()),
        ..Default::default()
    };
    let page = h
        .coordinator
        .list_sessions(&none, &PageRequest::default(), &sort)
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
}
