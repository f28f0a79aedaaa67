use chrono::{NaiveDate, NaiveTime};
use sqlx::FromRow;
use tollsync_core::toll_record::TollRecord;
use tollsync_core::types::{DbId, Timestamp};

/// A row from the `toll_records` table.
#[derive(Debug, Clone, FromRow)]
pub struct TollRecordRow {
    pub id: DbId,
    pub hash: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub entry_point: String,
    pub exit_point: String,
    pub amount: i64,
    pub vehicle_id: String,
    pub card_id: String,
    pub external_ref: Option<String>,
    pub external_row_id: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<TollRecordRow> for TollRecord {
    fn from(row: TollRecordRow) -> Self {
        Self {
            id: row.id,
            hash: row.hash,
            date: row.date,
            time: row.time,
            entry_point: row.entry_point,
            exit_point: row.exit_point,
            amount: row.amount,
            vehicle_id: row.vehicle_id,
            card_id: row.card_id,
            external_ref: row.external_ref,
            external_row_id: row.external_row_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
