//! Repository for the `mappings` table.

use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tollsync_core::mapping::{CreateMapping, MappingFilter, MappingStatus, UpdateMapping};
use tollsync_core::pagination::{PageRequest, SortSpec};
use tollsync_core::types::DbId;

use super::order_by;
use crate::models::mapping::MappingRow;

/// Column list for mappings queries.
const COLUMNS: &str = "id, toll_record_id, mapping_type, mapped_entity_id, mapped_entity_type, \
    confidence, status_id, metadata, created_by, created_at, updated_at";

/// Shared WHERE clause for list/count. Binds $1..$7.
const FILTER: &str = "WHERE ($1::BIGINT IS NULL OR toll_record_id = $1) \
      AND ($2::TEXT IS NULL OR mapping_type = $2) \
      AND ($3::TEXT IS NULL OR mapped_entity_type = $3) \
      AND ($4::BIGINT IS NULL OR mapped_entity_id = $4) \
      AND ($5::SMALLINT IS NULL OR status_id = $5) \
      AND ($6::DOUBLE PRECISION IS NULL OR confidence >= $6) \
      AND ($7::DOUBLE PRECISION IS NULL OR confidence <= $7)";

pub struct MappingRepo;

impl MappingRepo {
    /// Insert a mapping and set every id in `deactivate` INACTIVE, in one
    /// transaction.
    pub async fn create(
        pool: &PgPool,
        input: &CreateMapping,
        deactivate: &[DbId],
    ) -> Result<MappingRow, sqlx::Error> {
        let mut tx = pool.begin().await?;
        Self::deactivate(&mut tx, deactivate).await?;

        let query = format!(
            "INSERT INTO mappings \
                (toll_record_id, mapping_type, mapped_entity_id, mapped_entity_type, \
                 confidence, status_id, metadata, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, MappingRow>(&query)
            .bind(input.toll_record_id)
            .bind(&input.mapping_type)
            .bind(input.mapped_entity_id)
            .bind(&input.mapped_entity_type)
            .bind(input.confidence)
            .bind(input.status.id())
            .bind(Json(&input.metadata))
            .bind(&input.created_by)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<MappingRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM mappings WHERE id = $1");
        sqlx::query_as::<_, MappingRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        filter: &MappingFilter,
        page: &PageRequest,
        sort: &SortSpec,
    ) -> Result<(Vec<MappingRow>, i64), sqlx::Error> {
        let status_id = filter.status.map(MappingStatus::id);
        let query = format!(
            "SELECT {COLUMNS} FROM mappings {FILTER} {} LIMIT $8 OFFSET $9",
            order_by(sort, None)
        );
        let rows = sqlx::query_as::<_, MappingRow>(&query)
            .bind(filter.toll_record_id)
            .bind(&filter.mapping_type)
            .bind(&filter.mapped_entity_type)
            .bind(filter.mapped_entity_id)
            .bind(status_id)
            .bind(filter.min_confidence)
            .bind(filter.max_confidence)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM mappings {FILTER}");
        let total = sqlx::query_scalar::<_, i64>(&count_query)
            .bind(filter.toll_record_id)
            .bind(&filter.mapping_type)
            .bind(&filter.mapped_entity_type)
            .bind(filter.mapped_entity_id)
            .bind(status_id)
            .bind(filter.min_confidence)
            .bind(filter.max_confidence)
            .fetch_one(pool)
            .await?;

        Ok((rows, total))
    }

    /// Partial update; `None` fields keep their stored value. The ids in
    /// `deactivate` are set INACTIVE in the same transaction, which is rolled
    /// back when `id` does not exist.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateMapping,
        deactivate: &[DbId],
    ) -> Result<Option<MappingRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        Self::deactivate(&mut tx, deactivate).await?;

        let query = format!(
            "UPDATE mappings SET \
                mapping_type = COALESCE($2, mapping_type), \
                mapped_entity_id = COALESCE($3, mapped_entity_id), \
                mapped_entity_type = COALESCE($4, mapped_entity_type), \
                confidence = COALESCE($5, confidence), \
                status_id = COALESCE($6, status_id), \
                metadata = COALESCE($7, metadata) \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, MappingRow>(&query)
            .bind(id)
            .bind(&input.mapping_type)
            .bind(input.mapped_entity_id)
            .bind(&input.mapped_entity_type)
            .bind(input.confidence)
            .bind(input.status.map(MappingStatus::id))
            .bind(input.metadata.as_ref().map(Json))
            .fetch_optional(&mut *tx)
            .await?;

        if row.is_some() {
            tx.commit().await?;
        }
        Ok(row)
    }

    async fn deactivate(tx: &mut Transaction<'_, Postgres>, ids: &[DbId]) -> Result<(), sqlx::Error> {
        if ids.is_empty() {
            return Ok(());
        }
        sqlx::query("UPDATE mappings SET status_id = $2 WHERE id = ANY($1)")
            .bind(ids)
            .bind(MappingStatus::Inactive.id())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM mappings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_active_for_record(
        pool: &PgPool,
        toll_record_id: DbId,
    ) -> Result<Vec<MappingRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM mappings \
             WHERE toll_record_id = $1 AND status_id = $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, MappingRow>(&query)
            .bind(toll_record_id)
            .bind(MappingStatus::Active.id())
            .fetch_all(pool)
            .await
    }
}
