//! Repository for the `toll_records` table.

use sqlx::PgPool;
use tollsync_core::pagination::{PageRequest, SortSpec};
use tollsync_core::toll_record::{NewTollRecord, RecordFilter};
use tollsync_core::types::DbId;

use super::order_by;
use crate::models::toll_record::TollRecordRow;

/// Column list for toll_records queries.
const COLUMNS: &str = "id, hash, date, time, entry_point, exit_point, amount, \
    vehicle_id, card_id, external_ref, external_row_id, created_at, updated_at";

/// Shared WHERE clause for list/count. Binds $1..$7.
const FILTER: &str = "WHERE ($1::DATE IS NULL OR date >= $1) \
      AND ($2::DATE IS NULL OR date <= $2) \
      AND ($3::TEXT IS NULL OR (CASE WHEN $7 THEN strpos(vehicle_id, $3) > 0 ELSE vehicle_id = $3 END)) \
      AND ($4::TEXT IS NULL OR (CASE WHEN $7 THEN strpos(card_id, $4) > 0 ELSE card_id = $4 END)) \
      AND ($5::TEXT IS NULL OR (CASE WHEN $7 THEN strpos(entry_point, $5) > 0 ELSE entry_point = $5 END)) \
      AND ($6::TEXT IS NULL OR (CASE WHEN $7 THEN strpos(exit_point, $6) > 0 ELSE exit_point = $6 END))";

pub struct TollRecordRepo;

impl TollRecordRepo {
    /// Insert a record. Fails with a unique violation on
    /// `uq_toll_records_hash` when the hash exists.
    pub async fn create(pool: &PgPool, input: &NewTollRecord) -> Result<TollRecordRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO toll_records \
                (hash, date, time, entry_point, exit_point, amount, \
                 vehicle_id, card_id, external_ref, external_row_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TollRecordRow>(&query)
            .bind(&input.hash)
            .bind(input.date)
            .bind(input.time)
            .bind(&input.entry_point)
            .bind(&input.exit_point)
            .bind(input.amount)
            .bind(&input.vehicle_id)
            .bind(&input.card_id)
            .bind(&input.external_ref)
            .bind(&input.external_row_id)
            .fetch_one(pool)
            .await
    }

    /// Return the subset of `hashes` already stored.
    pub async fn existing_hashes(pool: &PgPool, hashes: &[String]) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT hash FROM toll_records WHERE hash = ANY($1)")
            .bind(hashes)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TollRecordRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM toll_records WHERE id = $1");
        sqlx::query_as::<_, TollRecordRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// One page of records matching `filter`, plus the total match count.
    pub async fn list(
        pool: &PgPool,
        filter: &RecordFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<(Vec<TollRecordRow>, i64), sqlx::Error> {
        let secondary = (sort.field == "date").then_some("time");
        let query = format!(
            "SELECT {COLUMNS} FROM toll_records {FILTER} {} LIMIT $8 OFFSET $9",
            order_by(sort, secondary)
        );
        let rows = sqlx::query_as::<_, TollRecordRow>(&query)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(&filter.vehicle_id)
            .bind(&filter.card_id)
            .bind(&filter.entry_point)
            .bind(&filter.exit_point)
            .bind(filter.partial_match)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM toll_records {FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&count_query)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(&filter.vehicle_id)
            .bind(&filter.card_id)
            .bind(&filter.entry_point)
            .bind(&filter.exit_point)
            .bind(filter.partial_match)
            .fetch_one(pool)
            .await?;

        Ok((rows, total))
    }

    /// Overwrite every semantic field (and the hash derived from them).
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &NewTollRecord,
    ) -> Result<Option<TollRecordRow>, sqlx::Error> {
        let query = format!(
            "UPDATE toll_records SET \
                hash = $2, date = $3, time = $4, entry_point = $5, exit_point = $6, \
                amount = $7, vehicle_id = $8, card_id = $9, external_ref = $10, \
                external_row_id = $11 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TollRecordRow>(&query)
            .bind(id)
            .bind(&input.hash)
            .bind(input.date)
            .bind(input.time)
            .bind(&input.entry_point)
            .bind(&input.exit_point)
            .bind(input.amount)
            .bind(&input.vehicle_id)
            .bind(&input.card_id)
            .bind(&input.external_ref)
            .bind(&input.external_row_id)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM toll_records WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
