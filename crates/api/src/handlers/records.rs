//! Handlers for toll record CRUD and candidate matching.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tollsync_core::toll_record::{CreateTollRecord, UpdateTollRecord};
use tollsync_core::types::DbId;

use crate::error::AppResult;
use crate::query::{RecordListParams, ThresholdParams};
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;

/// GET /api/v1/records
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<RecordListParams>,
) -> AppResult<impl IntoResponse> {
    let (filter, page, sort) = params.into_parts()?;
    let records = state.records.list_records(&filter, &page, &sort).await?;

    Ok(Json(ListResponse::new(records, &page)))
}

/// POST /api/v1/records
pub async fn create_record(
    State(state): State<AppState>,
    Json(input): Json<CreateTollRecord>,
) -> AppResult<impl IntoResponse> {
    let record = state.records.create_record(input).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: record })))
}

/// GET /api/v1/records/{id}
pub async fn get_record(
    State(state): State<AppState>,
    Path(record_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let record = state.records.get_record(record_id).await?;

    Ok(Json(DataResponse { data: record }))
}

/// PUT /api/v1/records/{id}
///
/// Partial update; the content hash follows the merged fields.
pub async fn update_record(
    State(state): State<AppState>,
    Path(record_id): Path<DbId>,
    Json(input): Json<UpdateTollRecord>,
) -> AppResult<impl IntoResponse> {
    let record = state.records.update_record(record_id, input).await?;

    Ok(Json(DataResponse { data: record }))
}

/// DELETE /api/v1/records/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    Path(record_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.records.delete_record(record_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/records/{id}/potential-matches?threshold=
pub async fn potential_matches(
    State(state): State<AppState>,
    Path(record_id): Path<DbId>,
    Query(params): Query<ThresholdParams>,
) -> AppResult<impl IntoResponse> {
    let matches = state
        .mappings
        .find_potential_matches(record_id, params.threshold.unwrap_or(0.0))
        .await?;

    Ok(Json(DataResponse { data: matches }))
}
