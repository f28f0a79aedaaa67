//! Read-only access to `external_trips`, the match candidate pool.

use chrono::NaiveDateTime;
use sqlx::PgPool;

use crate::models::external_trip::ExternalTripRow;

const COLUMNS: &str = "id, entity_type, occurred_at, vehicle_id, card_id, amount";

pub struct ExternalTripRepo;

impl ExternalTripRepo {
    /// Trips sharing the card or vehicle id, or occurring in `[from, to]`.
    pub async fn candidates(
        pool: &PgPool,
        card_id: &str,
        vehicle_id: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<ExternalTripRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM external_trips \
             WHERE card_id = $1 OR vehicle_id = $2 OR occurred_at BETWEEN $3 AND $4 \
             ORDER BY id"
        );
        sqlx::query_as::<_, ExternalTripRow>(&query)
            .bind(card_id)
            .bind(vehicle_id)
            .bind(from)
            .bind(to)
            .fetch_all(pool)
            .await
    }
}
