//! Import session state machine and row accounting.
//!
//! ```text
//! PENDING ──> PROCESSING ──> COMPLETED
//!    │            │  └─────> FAILED
//!    └────────────┴────────> CANCELLED
//! ```
//!
//! Every mutation goes through [`ImportSession`] methods so the counter
//! invariant `success + error + duplicate <= processed <= total` and the
//! `completed_at` ⇔ terminal rule hold after each call.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::toll_record::required_text;
use crate::types::Timestamp;

/// Sort fields accepted by session listings; the first is the default.
pub const SESSION_SORT_FIELDS: &[&str] =
    &["created_at", "started_at", "completed_at", "file_name", "total_rows"];

// ── Status ───────────────────────────────────────────────────────────

/// Session lifecycle status. Discriminants match `import_session_statuses`.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportStatus {
    Pending = 1,
    Processing = 2,
    Completed = 3,
    Failed = 4,
    Cancelled = 5,
}

impl ImportStatus {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Result<Self, CoreError> {
        match id {
            1 => Ok(Self::Pending),
            2 => Ok(Self::Processing),
            3 => Ok(Self::Completed),
            4 => Ok(Self::Failed),
            5 => Ok(Self::Cancelled),
            other => Err(CoreError::Internal(format!(
                "Unknown import session status id {other}"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parse a status name (case-insensitive).
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Invalid import status '{other}'"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Statuses reachable from `self` in one step.
    pub fn valid_transitions(self) -> &'static [ImportStatus] {
        match self {
            Self::Pending => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: ImportStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Error log ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    MissingField,
    InvalidDate,
    InvalidTime,
    InvalidAmount,
    MalformedRow,
    Header,
    Storage,
}

/// One entry of a session's error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    /// 1-based index among data rows; 0 for whole-file errors.
    pub row_number: u64,
    pub error_type: RowErrorKind,
    pub error_message: String,
    pub raw_data: String,
}

impl ErrorLogEntry {
    /// An entry that concerns the whole input rather than one row.
    pub fn for_file(kind: RowErrorKind, message: impl Into<String>) -> Self {
        Self {
            row_number: 0,
            error_type: kind,
            error_message: message.into(),
            raw_data: String::new(),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Validated input for opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImportSession {
    pub account_type: String,
    pub account_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub created_by: Option<String>,
}

impl NewImportSession {
    pub fn new(
        account_type: &str,
        account_id: &str,
        file_name: &str,
        file_size: i64,
        created_by: Option<&str>,
    ) -> Result<Self, CoreError> {
        if file_size < 0 {
            return Err(CoreError::Validation("file size must not be negative".into()));
        }
        Ok(Self {
            account_type: required_text("account_type", account_type)?,
            account_id: required_text("account_id", account_id)?,
            file_name: required_text("file_name", file_name)?,
            file_size,
            created_by: created_by
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSession {
    pub id: String,
    pub account_type: String,
    pub account_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub status: ImportStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub success_rows: i64,
    pub error_rows: i64,
    pub duplicate_rows: i64,
    pub error_log: Vec<ErrorLogEntry>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
}

impl ImportSession {
    /// A fresh session in PENDING with zeroed counters.
    pub fn new(id: String, input: NewImportSession, now: Timestamp) -> Self {
        Self {
            id,
            account_type: input.account_type,
            account_id: input.account_id,
            file_name: input.file_name,
            file_size: input.file_size,
            status: ImportStatus::Pending,
            total_rows: 0,
            processed_rows: 0,
            success_rows: 0,
            error_rows: 0,
            duplicate_rows: 0,
            error_log: Vec::new(),
            started_at: None,
            completed_at: None,
            created_by: input.created_by,
            created_at: now,
        }
    }

    /// Move to `next`, stamping `started_at` / `completed_at` as appropriate.
    ///
    /// Illegal moves (including any move out of a terminal state) are
    /// rejected and leave the session untouched.
    pub fn transition(&mut self, next: ImportStatus, now: Timestamp) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Validation(format!(
                "Cannot transition import session '{}' from {} to {}",
                self.id, self.status, next
            )));
        }
        if next == ImportStatus::Processing {
            self.started_at.get_or_insert(now);
        }
        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Error for a write against a session whose stored state is terminal.
    /// Stores return it instead of overwriting a finished session.
    pub fn finished_conflict(id: &str) -> CoreError {
        CoreError::Conflict(format!("Import session '{id}' has already finished"))
    }

    /// Register rows that were discovered but not yet classified.
    pub fn add_discovered_rows(&mut self, count: i64) {
        self.total_rows += count;
    }

    pub fn record_success(&mut self) {
        self.processed_rows += 1;
        self.success_rows += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.processed_rows += 1;
        self.duplicate_rows += 1;
    }

    /// Count a failed row; the entry is kept only while the log has room.
    pub fn record_row_error(&mut self, entry: ErrorLogEntry, max_log_entries: usize) {
        self.processed_rows += 1;
        self.error_rows += 1;
        self.push_log(entry, max_log_entries);
    }

    /// Log a whole-file problem without touching row counters.
    pub fn push_log(&mut self, entry: ErrorLogEntry, max_log_entries: usize) {
        if self.error_log.len() < max_log_entries {
            self.error_log.push(entry);
        }
    }

    pub fn counters_consistent(&self) -> bool {
        self.success_rows + self.error_rows + self.duplicate_rows <= self.processed_rows
            && self.processed_rows <= self.total_rows
    }

    /// Percentage of work done, for progress reporting.
    ///
    /// Terminal sessions report 100. Otherwise the declared byte size is
    /// preferred (`received_bytes` of `file_size`), capped at 99.
    pub fn percentage(&self, received_bytes: Option<u64>) -> u8 {
        if self.status == ImportStatus::Completed {
            return 100;
        }
        if self.is_terminal() {
            return self.row_percentage();
        }
        match (received_bytes, u64::try_from(self.file_size)) {
            (Some(received), Ok(size)) if size > 0 => {
                let pct = received.saturating_mul(100) / size;
                u8::try_from(pct.min(99)).unwrap_or(99)
            }
            (Some(_), _) => 0,
            (None, _) => self.row_percentage().min(99),
        }
    }

    fn row_percentage(&self) -> u8 {
        if self.total_rows <= 0 {
            return 0;
        }
        let pct = self.processed_rows.saturating_mul(100) / self.total_rows;
        u8::try_from(pct.clamp(0, 100)).unwrap_or(100)
    }

    pub fn progress(&self, received_bytes: Option<u64>) -> ImportProgress {
        ImportProgress {
            session_id: self.id.clone(),
            percentage: self.percentage(received_bytes),
            total_rows: self.total_rows,
            processed_rows: self.processed_rows,
            success_rows: self.success_rows,
            error_rows: self.error_rows,
            duplicate_rows: self.duplicate_rows,
            status: self.status,
        }
    }
}

/// Live counters emitted while a session is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub session_id: String,
    pub percentage: u8,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub success_rows: i64,
    pub error_rows: i64,
    pub duplicate_rows: i64,
    pub status: ImportStatus,
}

/// Filters for session listings. Absent fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub account_type: Option<String>,
    pub account_id: Option<String>,
    pub status: Option<ImportStatus>,
}

impl SessionFilter {
    pub fn matches(&self, session: &ImportSession) -> bool {
        self.account_type
            .as_ref()
            .map_or(true, |v| *v == session.account_type)
            && self
                .account_id
                .as_ref()
                .map_or(true, |v| *v == session.account_id)
            && self.status.map_or(true, |s| s == session.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn session() -> ImportSession {
        let input = NewImportSession::new("corporate", "acct-1", "may.csv", 100, None).unwrap();
        ImportSession::new("s-1".into(), input, Utc::now())
    }

    #[test]
    fn status_ids_round_trip() {
        for status in [
            ImportStatus::Pending,
            ImportStatus::Processing,
            ImportStatus::Completed,
            ImportStatus::Failed,
            ImportStatus::Cancelled,
        ] {
            assert_eq!(ImportStatus::from_id(status.id()).unwrap(), status);
            assert_eq!(ImportStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ImportStatus::from_id(0).is_err());
    }

    #[test]
    fn forward_transitions_stamp_timestamps() {
        let mut s = session();
        s.transition(ImportStatus::Processing, Utc::now()).unwrap();
        assert!(s.started_at.is_some());
        assert!(s.completed_at.is_none());
        s.transition(ImportStatus::Completed, Utc::now()).unwrap();
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut s = session();
        s.transition(ImportStatus::Cancelled, Utc::now()).unwrap();
        for next in [
            ImportStatus::Pending,
            ImportStatus::Processing,
            ImportStatus::Completed,
            ImportStatus::Failed,
            ImportStatus::Cancelled,
        ] {
            assert_matches!(s.transition(next, Utc::now()), Err(CoreError::Validation(_)));
        }
        assert_eq!(s.status, ImportStatus::Cancelled);
    }

    #[test]
    fn pending_cannot_complete_directly() {
        let mut s = session();
        assert!(s.transition(ImportStatus::Completed, Utc::now()).is_err());
        assert!(s.transition(ImportStatus::Failed, Utc::now()).is_err());
        assert_eq!(s.status, ImportStatus::Pending);
        assert!(s.completed_at.is_none());
    }

    #[test]
    fn counters_stay_consistent() {
        let mut s = session();
        s.add_discovered_rows(3);
        s.record_success();
        s.record_duplicate();
        s.record_row_error(
            ErrorLogEntry::for_file(RowErrorKind::MalformedRow, "bad"),
            10,
        );
        assert!(s.counters_consistent());
        assert_eq!(s.processed_rows, 3);
        assert_eq!(s.error_log.len(), 1);
    }

    #[test]
    fn error_log_is_capped_but_counting_continues() {
        let mut s = session();
        s.add_discovered_rows(5);
        for _ in 0..5 {
            s.record_row_error(ErrorLogEntry::for_file(RowErrorKind::InvalidAmount, "x"), 2);
        }
        assert_eq!(s.error_rows, 5);
        assert_eq!(s.error_log.len(), 2);
    }

    #[test]
    fn percentage_prefers_declared_size() {
        let mut s = session();
        s.transition(ImportStatus::Processing, Utc::now()).unwrap();
        assert_eq!(s.percentage(Some(50)), 50);
        assert_eq!(s.percentage(Some(500)), 99);
        s.transition(ImportStatus::Completed, Utc::now()).unwrap();
        assert_eq!(s.percentage(Some(50)), 100);
    }

    #[test]
    fn blank_identity_fields_rejected() {
        assert!(NewImportSession::new("", "a", "f.csv", 0, None).is_err());
        assert!(NewImportSession::new("t", " ", "f.csv", 0, None).is_err());
        assert!(NewImportSession::new("t", "a", "", 0, None).is_err());
    }
}
