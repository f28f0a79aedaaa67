//! Handlers for bulk imports and import session management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tollsync_pipeline::ImportRequest;

use crate::error::AppResult;
use crate::query::SessionListParams;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;

/// Request body for `POST /imports`. `content` is the full CSV text.
#[derive(Debug, Deserialize)]
pub struct CreateImportBody {
    pub account_type: String,
    pub account_id: String,
    pub file_name: String,
    pub content: String,
    pub created_by: Option<String>,
}

/// POST /api/v1/imports
///
/// Run a complete import and return the finished session.
pub async fn create_import(
    State(state): State<AppState>,
    Json(body): Json<CreateImportBody>,
) -> AppResult<impl IntoResponse> {
    let session = state
        .imports
        .start_import(ImportRequest {
            account_type: body.account_type,
            account_id: body.account_id,
            file_name: body.file_name,
            content: body.content.into_bytes(),
            created_by: body.created_by,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: session })))
}

/// GET /api/v1/imports
pub async fn list_imports(
    State(state): State<AppState>,
    Query(params): Query<SessionListParams>,
) -> AppResult<impl IntoResponse> {
    let (filter, page, sort) = params.into_parts()?;
    let sessions = state.imports.list_sessions(&filter, &page, &sort).await?;

    Ok(Json(ListResponse::new(sessions, &page)))
}

/// GET /api/v1/imports/{id}
pub async fn get_import(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = state.imports.get_session(&session_id).await?;

    Ok(Json(DataResponse { data: session }))
}

/// POST /api/v1/imports/{id}/cancel
///
/// Cancel a PENDING or PROCESSING session. Rows already stored are kept.
pub async fn cancel_import(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = state.imports.cancel_session(&session_id).await?;

    tracing::info!(session_id = %session_id, "Import cancelled via API");

    Ok(Json(DataResponse { data: session }))
}
