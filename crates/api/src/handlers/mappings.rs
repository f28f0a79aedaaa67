//! Handlers for mapping CRUD.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tollsync_core::mapping::{CreateMapping, UpdateMapping};
use tollsync_core::types::DbId;

use crate::error::AppResult;
use crate::query::MappingListParams;
use crate::response::{DataResponse, ListResponse};
use crate::state::AppState;

/// Body for `PUT /mappings/{id}/confidence`.
#[derive(Debug, Deserialize)]
pub struct ConfidenceBody {
    pub confidence: f64,
}

/// GET /api/v1/mappings
pub async fn list_mappings(
    State(state): State<AppState>,
    Query(params): Query<MappingListParams>,
) -> AppResult<impl IntoResponse> {
    let (filter, page, sort) = params.into_parts()?;
    let mappings = state.mappings.list_mappings(&filter, &page, &sort).await?;

    Ok(Json(ListResponse::new(mappings, &page)))
}

/// POST /api/v1/mappings
pub async fn create_mapping(
    State(state): State<AppState>,
    Json(input): Json<CreateMapping>,
) -> AppResult<impl IntoResponse> {
    let mapping = state.mappings.create_mapping(input).await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: mapping })))
}

/// GET /api/v1/mappings/{id}
pub async fn get_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let mapping = state.mappings.get_mapping(mapping_id).await?;

    Ok(Json(DataResponse { data: mapping }))
}

/// PUT /api/v1/mappings/{id}
pub async fn update_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<DbId>,
    Json(input): Json<UpdateMapping>,
) -> AppResult<impl IntoResponse> {
    let mapping = state.mappings.update_mapping(mapping_id, input).await?;

    Ok(Json(DataResponse { data: mapping }))
}

/// DELETE /api/v1/mappings/{id}
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.mappings.delete_mapping(mapping_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/mappings/{id}/confidence
///
/// Change only the confidence score; the status is left alone.
pub async fn update_confidence(
    State(state): State<AppState>,
    Path(mapping_id): Path<DbId>,
    Json(body): Json<ConfidenceBody>,
) -> AppResult<impl IntoResponse> {
    let mapping = state
        .mappings
        .update_confidence_score(mapping_id, body.confidence)
        .await?;

    Ok(Json(DataResponse { data: mapping }))
}
