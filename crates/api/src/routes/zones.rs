//! Safe zone endpoint handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Json,
};
use domain::models::safe_zone::{DeleteZoneResponse, SafeZoneResponse};
use domain::models::SubmittedZone;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::{record_zone_deleted, record_zone_sync};

/// List every zone of a device.
///
/// GET /api/v1/zones/:device_id
pub async fn list_zones(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<SafeZoneResponse>>, ApiError> {
    let zones = state.synchronizer.list(&device_id).await?;
    Ok(Json(zones.into_iter().map(SafeZoneResponse::from).collect()))
}

/// Merge the device's local zones into the cloud copy and return the full set.
///
/// POST /api/v1/zones/:device_id
pub async fn sync_zones(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    payload: Result<Json<Vec<SubmittedZone>>, JsonRejection>,
) -> Result<Json<Vec<SafeZoneResponse>>, ApiError> {
    let Json(submitted) = payload?;

    let outcome = state.synchronizer.sync(&device_id, submitted).await?;
    record_zone_sync(outcome.added);

    Ok(Json(
        outcome.zones.into_iter().map(SafeZoneResponse::from).collect(),
    ))
}

/// Delete one zone owned by the device.
///
/// DELETE /api/v1/zones/:device_id/:zone_id
pub async fn delete_zone(
    State(state): State<AppState>,
    path: Result<Path<(String, i64)>, PathRejection>,
) -> Result<Json<DeleteZoneResponse>, ApiError> {
    let Path((device_id, zone_id)) = path?;
    state.synchronizer.delete(&device_id, zone_id).await?;
    record_zone_deleted();

    Ok(Json(DeleteZoneResponse {
        status: "deleted".to_string(),
        id: zone_id,
    }))
}
