use axum::routing::{get, put};
use axum::Router;

use crate::handlers::mappings;
use crate::state::AppState;

/// Mapping routes mounted at `/mappings`.
///
/// ```text
/// GET    /                  -> list_mappings
/// POST   /                  -> create_mapping
/// GET    /{id}              -> get_mapping
/// PUT    /{id}              -> update_mapping
/// DELETE /{id}              -> delete_mapping
/// PUT    /{id}/confidence   -> update_confidence
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(mappings::list_mappings).post(mappings::create_mapping))
        .route(
            "/{id}",
            get(mappings::get_mapping)
                .put(mappings::update_mapping)
                .delete(mappings::delete_mapping),
        )
        .route("/{id}/confidence", put(mappings::update_confidence))
}
