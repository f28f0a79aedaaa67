//! Import coordinator: drives bulk and streamed imports through the session
//! state machine.
//!
//! Each session is processed by one worker. Rows are handled strictly in
//! order and in batches of `batch_size`; every batch costs at most one
//! `batch_check_hashes_exist` call and ends with one session update, so the
//! stored counters always satisfy the session invariant.
//!
//! Cancellation is cooperative. [`ImportCoordinator::cancel_session`] moves
//! the session to CANCELLED under the same lock the worker uses and trips the
//! worker's token; the worker notices before its next batch or chunk. Rows
//! already persisted stay persisted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tollsync_core::chunk::{ChunkAssembler, ChunkSequence, ImportChunk};
use tollsync_core::duplicate_detection::{Candidate, DuplicateDetector};
use tollsync_core::error::CoreError;
use tollsync_core::import_session::{
    ErrorLogEntry, ImportProgress, ImportSession, ImportStatus, NewImportSession, RowErrorKind,
    SessionFilter,
};
use tollsync_core::pagination::{Page, PageRequest, SortSpec};
use tollsync_core::row_parser::{self, ColumnSchema, RawRow};
use tollsync_core::storage::{ImportSessionStore, TollRecordStore};

use crate::config::PipelineConfig;

/// Input for a bulk import.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub account_type: String,
    pub account_id: String,
    pub file_name: String,
    pub content: Vec<u8>,
    pub created_by: Option<String>,
}

/// Input for a streamed import. The session id comes from the first chunk.
#[derive(Debug, Clone, Default)]
pub struct StreamRequest {
    pub account_type: String,
    pub account_id: String,
    pub file_name: String,
    /// Declared payload size in bytes, used for progress percentages.
    pub file_size: Option<i64>,
    pub created_by: Option<String>,
}

/// Channel pair for a streamed import.
///
/// Send chunks on `chunks`; read one progress message per chunk from
/// `progress`. The progress channel closes once the session is terminal or
/// the stream fails; a failure is delivered as a final `Err`.
#[derive(Debug)]
pub struct ImportStream {
    pub chunks: mpsc::Sender<ImportChunk>,
    pub progress: mpsc::Receiver<Result<ImportProgress, CoreError>>,
}

struct ActiveImport {
    session: Arc<Mutex<ImportSession>>,
    cancel: CancellationToken,
}

type Registry = Arc<RwLock<HashMap<String, ActiveImport>>>;

#[derive(Clone)]
pub struct ImportCoordinator {
    records: Arc<dyn TollRecordStore>,
    sessions: Arc<dyn ImportSessionStore>,
    config: PipelineConfig,
    active: Registry,
}

impl ImportCoordinator {
    pub fn new(
        records: Arc<dyn TollRecordStore>,
        sessions: Arc<dyn ImportSessionStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            records,
            sessions,
            config,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    // ── Bulk ─────────────────────────────────────────────────────────

    /// Import a complete payload and return the finished session.
    ///
    /// Row-level problems are recorded in the session; the call itself
    /// fails only for invalid input, a header without the required columns,
    /// or a storage failure. The work runs on its own task, so dropping the
    /// returned future does not strand the session in PROCESSING.
    pub async fn start_import(&self, request: ImportRequest) -> Result<ImportSession, CoreError> {
        let input = NewImportSession::new(
            &request.account_type,
            &request.account_id,
            &request.file_name,
            i64::try_from(request.content.len()).unwrap_or(i64::MAX),
            request.created_by.as_deref(),
        )?;
        if request.content.is_empty() {
            return Err(CoreError::Validation("content must not be empty".into()));
        }

        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.run_import(input, request.content).await })
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "Bulk import task failed");
                CoreError::Internal("Import task failed".into())
            })?
    }

    async fn run_import(&self, input: NewImportSession, content: Vec<u8>) -> Result<ImportSession, CoreError> {
        let session = ImportSession::new(uuid::Uuid::now_v7().to_string(), input, Utc::now());
        let session_id = session.id.clone();
        let file_name = session.file_name.clone();
        let mut worker = self.open(session).await?;
        tracing::info!(
            session_id = %session_id,
            file_name = %file_name,
            bytes = content.len(),
            "Bulk import started",
        );

        let result = self.run_bulk(&mut worker, &content).await;
        self.unregister(&session_id).await;
        result?;

        let session = worker.snapshot().await;
        tracing::info!(
            session_id = %session.id,
            status = %session.status,
            total = session.total_rows,
            success = session.success_rows,
            errors = session.error_rows,
            duplicates = session.duplicate_rows,
            "Bulk import finished",
        );
        Ok(session)
    }

    async fn run_bulk(&self, worker: &mut SessionWorker, content: &[u8]) -> Result<(), CoreError> {
        let rows = row_parser::read_records(row_parser::strip_bom(content));
        let data_rows = i64::try_from(rows.len().saturating_sub(1)).unwrap_or(i64::MAX);
        worker
            .with_session(|s| s.add_discovered_rows(data_rows))
            .await;
        worker.ingest(rows, RowAccounting::Declared).await?;
        worker.finish().await
    }

    // ── Stream ───────────────────────────────────────────────────────

    /// Open a streamed import.
    ///
    /// The chunk channel holds a single chunk, so a sender waits until the
    /// previous chunk has been fully processed.
    pub fn start_import_stream(&self, request: StreamRequest) -> Result<ImportStream, CoreError> {
        let input = NewImportSession::new(
            &request.account_type,
            &request.account_id,
            &request.file_name,
            request.file_size.unwrap_or(0),
            request.created_by.as_deref(),
        )?;

        let (chunk_tx, chunk_rx) = mpsc::channel(1);
        let (progress_tx, progress_rx) = mpsc::channel(self.config.stream_channel_capacity);

        let coordinator = self.clone();
        tokio::spawn(async move {
            coordinator.run_stream(input, chunk_rx, progress_tx).await;
        });

        Ok(ImportStream {
            chunks: chunk_tx,
            progress: progress_rx,
        })
    }

    async fn run_stream(
        &self,
        input: NewImportSession,
        mut chunks: mpsc::Receiver<ImportChunk>,
        progress: mpsc::Sender<Result<ImportProgress, CoreError>>,
    ) {
        let mut sequence = ChunkSequence::new();
        let mut assembler = ChunkAssembler::new();
        let mut worker: Option<SessionWorker> = None;

        loop {
            let Some(chunk) = chunks.recv().await else {
                match &worker {
                    None => {
                        let _ = progress
                            .send(Err(CoreError::Validation(
                                "stream closed before any chunk was sent".into(),
                            )))
                            .await;
                    }
                    Some(w) => {
                        tracing::warn!(
                            session_id = %w.session_id,
                            chunks = sequence.accepted(),
                            "Stream closed before the last chunk; session left in progress",
                        );
                    }
                }
                break;
            };

            if let Err(err) = sequence.accept(&chunk) {
                tracing::warn!(sequence = chunk.sequence, error = %err, "Rejected stream chunk");
                if let Some(w) = &worker {
                    w.fail(ErrorLogEntry::for_file(RowErrorKind::MalformedRow, err.to_string()))
                        .await;
                }
                let _ = progress.send(Err(err)).await;
                break;
            }

            if worker.is_none() {
                match self.open_stream_session(&input, &chunk.session_id).await {
                    Ok(w) => worker = Some(w),
                    Err(err) => {
                        let _ = progress.send(Err(err)).await;
                        break;
                    }
                }
            }
            let Some(w) = worker.as_mut() else { break };

            if w.is_cancelled() {
                let _ = progress.send(Ok(w.progress(assembler.received_bytes()).await)).await;
                break;
            }

            tracing::debug!(
                session_id = %w.session_id,
                sequence = chunk.sequence,
                bytes = chunk.payload.len(),
                is_last = chunk.is_last,
                "Processing stream chunk",
            );

            let mut ready = assembler.push(&chunk.payload);
            if chunk.is_last {
                ready.extend(assembler.finish());
            }
            let bytes = if w.schema.is_none() {
                row_parser::strip_bom(&ready)
            } else {
                &ready[..]
            };
            let rows = row_parser::read_records(bytes);

            let outcome = match w.ingest(rows, RowAccounting::Discovered).await {
                Ok(()) if chunk.is_last => w.finish().await,
                other => other,
            };
            if let Err(err) = outcome {
                let _ = progress.send(Err(err)).await;
                break;
            }

            let update = w.progress(assembler.received_bytes()).await;
            let terminal = update.status.is_terminal();
            if progress.send(Ok(update)).await.is_err() {
                tracing::debug!(session_id = %w.session_id, "Progress receiver dropped");
            }
            if terminal {
                break;
            }
        }

        if let Some(w) = &worker {
            self.unregister(&w.session_id).await;
        }
    }

    async fn open_stream_session(
        &self,
        input: &NewImportSession,
        session_id: &str,
    ) -> Result<SessionWorker, CoreError> {
        let session_id = session_id.trim();
        if self.sessions.get_session(session_id).await?.is_some() {
            return Err(CoreError::Conflict(format!(
                "Import session '{session_id}' already exists"
            )));
        }
        let session = ImportSession::new(session_id.to_string(), input.clone(), Utc::now());
        let worker = self.open(session).await?;
        tracing::info!(
            session_id = %session_id,
            file_name = %input.file_name,
            "Streamed import started",
        );
        Ok(worker)
    }

    // ── Queries and cancellation ─────────────────────────────────────

    pub async fn get_session(&self, id: &str) -> Result<ImportSession, CoreError> {
        self.sessions
            .get_session(id)
            .await?
            .ok_or_else(|| CoreError::not_found("ImportSession", id))
    }

    pub async fn list_sessions(
        &self,
        filter: &SessionFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<Page<ImportSession>, CoreError> {
        self.sessions.list_sessions(filter, page, sort).await
    }

    /// Cancel a PENDING or PROCESSING session. Persisted rows are kept.
    pub async fn cancel_session(&self, id: &str) -> Result<ImportSession, CoreError> {
        let running = {
            let active = self.active.read().await;
            active
                .get(id)
                .map(|a| (Arc::clone(&a.session), a.cancel.clone()))
        };

        let cancelled = match running {
            Some((session, token)) => {
                let mut session = session.lock().await;
                session.transition(ImportStatus::Cancelled, Utc::now())?;
                self.sessions.update_session(&session).await?;
                token.cancel();
                session.clone()
            }
            None => {
                let mut session = self.get_session(id).await?;
                session.transition(ImportStatus::Cancelled, Utc::now())?;
                self.sessions.update_session(&session).await?;
                session
            }
        };
        tracing::info!(session_id = %id, processed = cancelled.processed_rows, "Import cancelled");
        Ok(cancelled)
    }

    // ── Registry ─────────────────────────────────────────────────────

    /// Register, persist and start a new session.
    ///
    /// The session lock is taken before the session becomes visible in the
    /// registry and held until it is stored as PROCESSING, so a concurrent
    /// cancel applies to the started session and is never overwritten.
    async fn open(&self, session: ImportSession) -> Result<SessionWorker, CoreError> {
        let session_id = session.id.clone();
        let session = Arc::new(Mutex::new(session));
        let cancel = CancellationToken::new();
        let mut guard = Arc::clone(&session).lock_owned().await;
        self.active.write().await.insert(
            session_id.clone(),
            ActiveImport {
                session: Arc::clone(&session),
                cancel: cancel.clone(),
            },
        );

        let started = self.store_started(&mut guard).await;
        drop(guard);
        if let Err(err) = started {
            self.unregister(&session_id).await;
            return Err(err);
        }

        Ok(SessionWorker {
            session_id,
            session,
            cancel,
            records: Arc::clone(&self.records),
            sessions: Arc::clone(&self.sessions),
            batch_size: self.config.batch_size,
            max_error_log: self.config.max_error_log,
            schema: None,
            detector: DuplicateDetector::new(),
            next_row: 1,
        })
    }

    /// Persist as PENDING, then move to PROCESSING.
    async fn store_started(&self, session: &mut ImportSession) -> Result<(), CoreError> {
        self.sessions.persist_session(session).await?;
        session.transition(ImportStatus::Processing, Utc::now())?;
        self.sessions.update_session(session).await
    }

    async fn unregister(&self, session_id: &str) {
        self.active.write().await.remove(session_id);
    }
}

/// How `total_rows` is maintained while rows are ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowAccounting {
    /// Set once before processing (bulk).
    Declared,
    /// Grown as rows are discovered (stream).
    Discovered,
}

/// Per-session processing state.
struct SessionWorker {
    session_id: String,
    session: Arc<Mutex<ImportSession>>,
    cancel: CancellationToken,
    records: Arc<dyn TollRecordStore>,
    sessions: Arc<dyn ImportSessionStore>,
    batch_size: usize,
    max_error_log: usize,
    schema: Option<ColumnSchema>,
    detector: DuplicateDetector,
    next_row: u64,
}

impl SessionWorker {
    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    async fn snapshot(&self) -> ImportSession {
        self.session.lock().await.clone()
    }

    async fn with_session(&self, f: impl FnOnce(&mut ImportSession)) {
        f(&mut *self.session.lock().await);
    }

    async fn progress(&self, received_bytes: u64) -> ImportProgress {
        self.session.lock().await.progress(Some(received_bytes))
    }

    /// Consume rows: the first row ever seen is the header, the rest are
    /// data rows processed in batches.
    async fn ingest(&mut self, rows: Vec<RawRow>, accounting: RowAccounting) -> Result<(), CoreError> {
        let mut rows = rows.into_iter();

        if self.schema.is_none() {
            let Some(header) = rows.next() else {
                return Ok(());
            };
            let schema = match header {
                RawRow::Record(record) => ColumnSchema::from_header(&record),
                RawRow::Malformed { message, .. } => Err(CoreError::Validation(format!(
                    "Header row is unreadable: {message}"
                ))),
            };
            match schema {
                Ok(schema) => self.schema = Some(schema),
                Err(err) => {
                    self.fail(ErrorLogEntry::for_file(RowErrorKind::Header, err.to_string()))
                        .await;
                    return Err(err);
                }
            }
        }

        let rows: Vec<RawRow> = rows.collect();
        for batch in rows.chunks(self.batch_size) {
            if self.is_cancelled() {
                tracing::info!(session_id = %self.session_id, "Cancellation observed, stopping");
                return Ok(());
            }
            self.process_batch(batch, accounting).await?;
        }
        Ok(())
    }

    async fn process_batch(&mut self, batch: &[RawRow], accounting: RowAccounting) -> Result<(), CoreError> {
        let Some(schema) = self.schema.as_ref() else {
            return Ok(());
        };
        let session_lock = Arc::clone(&self.session);
        let mut session = session_lock.lock().await;
        if session.is_terminal() {
            return Ok(());
        }
        if accounting == RowAccounting::Discovered {
            session.add_discovered_rows(i64::try_from(batch.len()).unwrap_or(i64::MAX));
        }

        let mut candidates = Vec::with_capacity(batch.len());
        for raw in batch {
            let row_number = self.next_row;
            self.next_row += 1;
            match raw {
                RawRow::Record(record) => match row_parser::parse_row(schema, row_number, record) {
                    Ok(record) => candidates.push(Candidate { row_number, record }),
                    Err(entry) => session.record_row_error(entry, self.max_error_log),
                },
                RawRow::Malformed { raw, message } => session.record_row_error(
                    ErrorLogEntry {
                        row_number,
                        error_type: RowErrorKind::MalformedRow,
                        error_message: message.clone(),
                        raw_data: raw.clone(),
                    },
                    self.max_error_log,
                ),
            }
        }

        let to_check = self.detector.hashes_to_check(&candidates);
        let known = if to_check.is_empty() {
            HashMap::new()
        } else {
            match self.records.batch_check_hashes_exist(&to_check).await {
                Ok(known) => known,
                Err(err) => return Err(self.abort_on_storage(&mut session, err).await),
            }
        };

        let partition = self.detector.partition(candidates, &known);
        for _ in &partition.duplicates {
            session.record_duplicate();
        }
        for candidate in partition.fresh {
            match self.records.create_record(&candidate.record).await {
                Ok(_) => session.record_success(),
                Err(CoreError::Conflict(_)) => session.record_duplicate(),
                Err(err) => return Err(self.abort_on_storage(&mut session, err).await),
            }
        }

        self.sessions.update_session(&session).await?;
        tracing::debug!(
            session_id = %self.session_id,
            processed = session.processed_rows,
            success = session.success_rows,
            errors = session.error_rows,
            duplicates = session.duplicate_rows,
            "Batch processed",
        );
        Ok(())
    }

    /// Move to COMPLETED, or FAILED when no data row was ever seen.
    async fn finish(&self) -> Result<(), CoreError> {
        let mut session = self.session.lock().await;
        if session.is_terminal() {
            return Ok(());
        }
        let next = if session.processed_rows > 0 {
            ImportStatus::Completed
        } else {
            let message = if self.schema.is_some() {
                "input contains a header but no data rows"
            } else {
                "input contains no rows"
            };
            session.push_log(
                ErrorLogEntry::for_file(RowErrorKind::Header, message),
                self.max_error_log,
            );
            ImportStatus::Failed
        };
        session.transition(next, Utc::now())?;
        self.sessions.update_session(&session).await
    }

    /// Record `entry` and move to FAILED, unless the session is already
    /// terminal. Persisting is best effort; the caller reports the cause.
    async fn fail(&self, entry: ErrorLogEntry) {
        let mut session = self.session.lock().await;
        if session.is_terminal() {
            return;
        }
        session.push_log(entry, self.max_error_log);
        if session.transition(ImportStatus::Failed, Utc::now()).is_ok() {
            if let Err(err) = self.sessions.update_session(&session).await {
                tracing::warn!(session_id = %self.session_id, error = %err, "Failed to persist failed session");
            }
        }
    }

    async fn abort_on_storage(&self, session: &mut ImportSession, err: CoreError) -> CoreError {
        tracing::error!(session_id = %self.session_id, error = %err, "Storage failure during import");
        session.push_log(
            ErrorLogEntry::for_file(RowErrorKind::Storage, "storage failure while persisting rows"),
            self.max_error_log,
        );
        if session.transition(ImportStatus::Failed, Utc::now()).is_ok() {
            if let Err(persist_err) = self.sessions.update_session(session).await {
                tracing::warn!(session_id = %self.session_id, error = %persist_err, "Failed to persist failed session");
            }
        }
        CoreError::Internal("Import aborted by a storage failure".into())
    }
}
