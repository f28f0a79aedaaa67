use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{import_stream, imports};
use crate::state::AppState;

/// Import routes mounted at `/imports`.
///
/// ```text
/// GET    /                -> list_imports
/// POST   /                -> create_import
/// GET    /stream          -> import_stream (WebSocket)
/// GET    /{id}            -> get_import
/// POST   /{id}/cancel     -> cancel_import
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(imports::list_imports).post(imports::create_import))
        .route("/stream", get(import_stream::import_stream))
        .route("/{id}", get(imports::get_import))
        .route("/{id}/cancel", post(imports::cancel_import))
}
