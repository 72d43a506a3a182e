//! Location domain model.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::time::ReportedTimestamp;
use validator::Validate;

/// Represents a stored location sample.
///
/// `timestamp` is the device-reported event time converted to the canonical
/// local zone and stored without annotation. `server_received_at` is the UTC
/// ingestion instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i64,
    pub device_id_fk: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: NaiveDateTime,
    pub server_received_at: DateTime<Utc>,
}

/// A location sample about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocation {
    pub device_id_fk: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: NaiveDateTime,
    pub server_received_at: DateTime<Utc>,
}

/// Request payload for a single location upload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IngestLocationRequest {
    /// External identifier of the reporting device.
    #[validate(custom(function = "shared::validation::validate_not_blank"))]
    pub device_unique_id: String,

    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    /// Event time; an ISO 8601 string with or without offset, or epoch seconds.
    pub timestamp: ReportedTimestamp,
}

/// Query parameters for the history endpoint.
///
/// Bounds are compared against the stored naive timestamps after dropping any
/// zone annotation, without conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationHistoryQuery {
    pub start_date: ReportedTimestamp,
    pub end_date: ReportedTimestamp,
}

/// Response payload for a stored location.
#[derive(Debug, Clone, Serialize)]
pub struct LocationResponse {
    pub id: i64,
    pub device_id_fk: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: NaiveDateTime,
    pub server_received_at: DateTime<Utc>,
}

impl From<Location> for LocationResponse {
    fn from(location: Location) -> Self {
        Self {
            id: location.id,
            device_id_fk: location.device_id_fk,
            latitude: location.latitude,
            longitude: location.longitude,
            timestamp: location.timestamp,
            server_received_at: location.server_received_at,
        }
    }
}
