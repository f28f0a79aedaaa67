use sqlx::types::Json;
use sqlx::FromRow;
use tollsync_core::error::CoreError;
use tollsync_core::import_session::{ErrorLogEntry, ImportSession, ImportStatus};
use tollsync_core::types::Timestamp;

/// A row from the `import_sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct ImportSessionRow {
    pub id: String,
    pub account_type: String,
    pub account_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub status_id: i16,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub success_rows: i64,
    pub error_rows: i64,
    pub duplicate_rows: i64,
    pub error_log: Json<Vec<ErrorLogEntry>>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
}

impl TryFrom<ImportSessionRow> for ImportSession {
    type Error = CoreError;

    fn try_from(row: ImportSessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            account_type: row.account_type,
            account_id: row.account_id,
            file_name: row.file_name,
            file_size: row.file_size,
            status: ImportStatus::from_id(row.status_id)?,
            total_rows: row.total_rows,
            processed_rows: row.processed_rows,
            success_rows: row.success_rows,
            error_rows: row.error_rows,
            duplicate_rows: row.duplicate_rows,
            error_log: row.error_log.0,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}
