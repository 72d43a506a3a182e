//! Location endpoint handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use domain::models::location::LocationResponse;
use domain::models::{IngestLocationRequest, LocationHistoryQuery};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_location_ingested;

/// Record one location sample.
///
/// POST /api/v1/locations
pub async fn ingest_location(
    State(state): State<AppState>,
    payload: Result<Json<IngestLocationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LocationResponse>), ApiError> {
    let Json(request) = payload?;

    let location = state.normalizer.ingest(request).await?;
    record_location_ingested();

    Ok((StatusCode::CREATED, Json(location.into())))
}

/// Samples of a device between two timestamps, inclusive, oldest first.
///
/// GET /api/v1/locations/:device_id/history?start_date=...&end_date=...
pub async fn location_history(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    query: Result<Query<LocationHistoryQuery>, QueryRejection>,
) -> Result<Json<Vec<LocationResponse>>, ApiError> {
    let Query(query) = query?;

    let locations = state
        .normalizer
        .history(&device_id, query.start_date, query.end_date)
        .await?;

    Ok(Json(locations.into_iter().map(LocationResponse::from).collect()))
}

/// Most recent sample of a device.
///
/// GET /api/v1/locations/:device_id/latest
pub async fn latest_location(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<LocationResponse>, ApiError> {
    state
        .normalizer
        .latest(&device_id)
        .await?
        .map(|location| Json(location.into()))
        .ok_or_else(|| ApiError::NotFound("No location recorded for device".to_string()))
}
