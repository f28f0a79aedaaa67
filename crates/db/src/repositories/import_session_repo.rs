//! Repository for the `import_sessions` table.

use sqlx::types::Json;
use sqlx::PgPool;
use tollsync_core::import_session::{ImportSession, ImportStatus, SessionFilter};
use tollsync_core::pagination::{PageRequest, SortSpec};

use super::order_by;
use crate::models::import_session::ImportSessionRow;

/// Column list for import_sessions queries.
const COLUMNS: &str = "id, account_type, account_id, file_name, file_size, status_id, \
    total_rows, processed_rows, success_rows, error_rows, duplicate_rows, error_log, \
    started_at, completed_at, created_by, created_at";

/// Shared WHERE clause for list/count. Binds $1..$3.
const FILTER: &str = "WHERE ($1::TEXT IS NULL OR account_type = $1) \
      AND ($2::TEXT IS NULL OR account_id = $2) \
      AND ($3::SMALLINT IS NULL OR status_id = $3)";

pub struct ImportSessionRepo;

impl ImportSessionRepo {
    pub async fn insert(pool: &PgPool, session: &ImportSession) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO import_sessions \
                (id, account_type, account_id, file_name, file_size, status_id, \
                 total_rows, processed_rows, success_rows, error_rows, duplicate_rows, \
                 error_log, started_at, completed_at, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
        )
        .bind(&session.id)
        .bind(&session.account_type)
        .bind(&session.account_id)
        .bind(&session.file_name)
        .bind(session.file_size)
        .bind(session.status.id())
        .bind(session.total_rows)
        .bind(session.processed_rows)
        .bind(session.success_rows)
        .bind(session.error_rows)
        .bind(session.duplicate_rows)
        .bind(Json(&session.error_log))
        .bind(session.started_at)
        .bind(session.completed_at)
        .bind(&session.created_by)
        .bind(session.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Write status, counters, error log and timestamps. Returns `false` if
    /// the id is unknown or the stored session is already terminal.
    pub async fn update(pool: &PgPool, session: &ImportSession) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE import_sessions SET \
                status_id = $2, total_rows = $3, processed_rows = $4, success_rows = $5, \
                error_rows = $6, duplicate_rows = $7, error_log = $8, \
                started_at = $9, completed_at = $10 \
             WHERE id = $1 AND status_id NOT IN (3, 4, 5)",
        )
        .bind(&session.id)
        .bind(session.status.id())
        .bind(session.total_rows)
        .bind(session.processed_rows)
        .bind(session.success_rows)
        .bind(session.error_rows)
        .bind(session.duplicate_rows)
        .bind(Json(&session.error_log))
        .bind(session.started_at)
        .bind(session.completed_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<ImportSessionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM import_sessions WHERE id = $1");
        sqlx::query_as::<_, ImportSessionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &SessionFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<(Vec<ImportSessionRow>, i64), sqlx::Error> {
        let status_id = filter.status.map(ImportStatus::id);
        let query = format!(
            "SELECT {COLUMNS} FROM import_sessions {FILTER} {} LIMIT $4 OFFSET $5",
            order_by(sort, None)
        );
        let rows = sqlx::query_as::<_, ImportSessionRow>(&query)
            .bind(&filter.account_type)
            .bind(&filter.account_id)
            .bind(status_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM import_sessions {FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&count_query)
            .bind(&filter.account_type)
            .bind(&filter.account_id)
            .bind(status_id)
            .fetch_one(pool)
            .await?;

        Ok((rows, total))
    }
}
