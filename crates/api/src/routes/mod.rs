pub mod health;
pub mod imports;
pub mod mappings;
pub mod records;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /imports                                  list, bulk import
/// /imports/stream                           streamed import (WebSocket)
/// /imports/{id}                             get session
/// /imports/{id}/cancel                      cancel session (POST)
///
/// /records                                  list, create
/// /records/{id}                             get, update, delete
/// /records/{id}/potential-matches           scored candidates
///
/// /mappings                                 list, create
/// /mappings/{id}                            get, update, delete
/// /mappings/{id}/confidence                 update confidence (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/imports", imports::router())
        .nest("/records", records::router())
        .nest("/mappings", mappings::router())
}
