use chrono::NaiveDateTime;
use sqlx::FromRow;
use tollsync_core::matching::ExternalCandidate;
use tollsync_core::types::DbId;

/// A row from the `external_trips` table.
#[derive(Debug, Clone, FromRow)]
pub struct ExternalTripRow {
    pub id: DbId,
    pub entity_type: String,
    pub occurred_at: NaiveDateTime,
    pub vehicle_id: Option<String>,
    pub card_id: Option<String>,
    pub amount: Option<i64>,
}

impl From<ExternalTripRow> for ExternalCandidate {
    fn from(row: ExternalTripRow) -> Self {
        Self {
            entity_id: row.id,
            entity_type: row.entity_type,
            occurred_at: row.occurred_at,
            vehicle_id: row.vehicle_id,
            card_id: row.card_id,
            amount: row.amount,
        }
    }
}
