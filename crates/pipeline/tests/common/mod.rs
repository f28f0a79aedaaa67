#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::mpsc;
use tollsync_core::chunk::ImportChunk;
use tollsync_core::error::CoreError;
use tollsync_core::import_session::ImportProgress;
use tollsync_core::matching::ExternalCandidate;
use tollsync_core::toll_record::CreateTollRecord;
use tollsync_pipeline::{
    ImportCoordinator, ImportRequest, MappingEngine, MemoryStore, PipelineConfig,
    StaticCandidates, TollRecordService,
};

pub const HEADER: &str = "date,time,entry_point,exit_point,amount,vehicle_id,card_id,external_ref\n";

/// Everything wired to one in-memory store.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub coordinator: ImportCoordinator,
    pub engine: MappingEngine,
    pub records: TollRecordService,
}

pub fn harness() -> Harness {
    harness_with(PipelineConfig::default(), Vec::new())
}

pub fn harness_with(config: PipelineConfig, candidates: Vec<ExternalCandidate>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(store.clone(), store.clone(), config.clone());
    let engine = MappingEngine::new(
        store.clone(),
        store.clone(),
        Arc::new(StaticCandidates::new(candidates)),
        &config,
    )
    .unwrap();
    let records = TollRecordService::new(store.clone(), config.delete_policy);
    Harness {
        store,
        coordinator,
        engine,
        records,
    }
}

/// A well-formed data row; `n` makes the content unique.
pub fn row(n: u32) -> String {
    format!("2024-03-01,08:{:02}:00,Tokyo IC,Yokohama IC,{},V-{n},C-{n},REF-{n}\n", n % 60, 1000 + n)
}

pub fn csv(rows: &[String]) -> String {
    let mut out = HEADER.to_string();
    for r in rows {
        out.push_str(r);
    }
    out
}

pub fn request(content: &str) -> ImportRequest {
    ImportRequest {
        account_type: "corporate".into(),
        account_id: "acct-1".into(),
        file_name: "usage.csv".into(),
        content: content.as_bytes().to_vec(),
        created_by: Some("tester".into()),
    }
}

pub fn chunk(session_id: &str, sequence: u64, is_last: bool, data: &str) -> ImportChunk {
    ImportChunk {
        session_id: session_id.into(),
        payload: data.as_bytes().to_vec(),
        sequence,
        is_last,
    }
}

/// Next progress message, failing the test instead of hanging.
pub async fn next(
    progress: &mut mpsc::Receiver<Result<ImportProgress, CoreError>>,
) -> Option<Result<ImportProgress, CoreError>> {
    tokio::time::timeout(Duration::from_secs(5), progress.recv())
        .await
        .expect("timed out waiting for progress")
}

pub fn new_record(vehicle: &str, amount: i64) -> CreateTollRecord {
    CreateTollRecord {
        date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        entry_point: "Tokyo IC".into(),
        exit_point: "Yokohama IC".into(),
        amount,
        vehicle_id: vehicle.into(),
        card_id: "C-1".into(),
        external_ref: None,
        external_row_id: None,
    }
}
