use axum::routing::get;
use axum::Router;

use crate::handlers::records;
use crate::state::AppState;

/// Toll record routes mounted at `/records`.
///
/// ```text
/// GET    /                           -> list_records
/// POST   /                           -> create_record
/// GET    /{id}                       -> get_record
/// PUT    /{id}                       -> update_record
/// DELETE /{id}                       -> delete_record
/// GET    /{id}/potential-matches     -> potential_matches
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(records::list_records).post(records::create_record))
        .route(
            "/{id}",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/{id}/potential-matches", get(records::potential_matches))
}
