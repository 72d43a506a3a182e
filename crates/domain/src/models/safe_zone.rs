//! Safe zone domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

/// Radius applied when a submitted zone does not carry one.
pub const DEFAULT_ZONE_RADIUS_METERS: f64 = 100.0;

/// Two zones of the same device whose latitudes and longitudes both differ
/// by less than this many degrees (~11 m) are the same zone.
pub const ZONE_PROXIMITY_DEGREES: f64 = 0.0001;

/// A named circular geofence owned by one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub id: i64,
    pub device_id_fk: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub created_at: DateTime<Utc>,
}

/// A zone about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSafeZone {
    pub device_id_fk: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

/// A zone as submitted by a device during sync.
///
/// Every field is optional at the wire level so that a missing value is
/// reported as a validation error rather than a body parse failure.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SubmittedZone {
    #[validate(
        required(message = "Name is required"),
        length(min = 1, max = 100, message = "Name must be 1-100 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: Option<String>,

    #[validate(
        required(message = "Latitude is required"),
        custom(function = "shared::validation::validate_latitude")
    )]
    pub latitude: Option<f64>,

    #[validate(
        required(message = "Longitude is required"),
        custom(function = "shared::validation::validate_longitude")
    )]
    pub longitude: Option<f64>,

    #[validate(custom(function = "shared::validation::validate_radius"))]
    pub radius: Option<f64>,
}

/// A validated submitted zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneCandidate {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

impl SubmittedZone {
    /// Builds a fully specified submission.
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: Some(name.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            radius: None,
        }
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Validates the submission and fills in the default radius.
    pub fn into_candidate(self) -> Result<ZoneCandidate, ValidationErrors> {
        self.validate()?;
        match (self.name, self.latitude, self.longitude) {
            (Some(name), Some(latitude), Some(longitude)) => Ok(ZoneCandidate {
                name,
                latitude,
                longitude,
                radius: self.radius.unwrap_or(DEFAULT_ZONE_RADIUS_METERS),
            }),
            // validate() has already rejected missing fields
            _ => Err(ValidationErrors::new()),
        }
    }
}

/// Proximity predicate defining "the same zone". Both axes must be strictly
/// closer than [`ZONE_PROXIMITY_DEGREES`]; names are ignored.
pub fn is_same_zone(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> bool {
    (lat_a - lat_b).abs() < ZONE_PROXIMITY_DEGREES && (lon_a - lon_b).abs() < ZONE_PROXIMITY_DEGREES
}

impl SafeZone {
    /// Whether `candidate` denotes this zone.
    pub fn matches(&self, candidate: &ZoneCandidate) -> bool {
        is_same_zone(
            self.latitude,
            self.longitude,
            candidate.latitude,
            candidate.longitude,
        )
    }
}

impl ZoneCandidate {
    pub fn into_new_zone(self, device_id_fk: i64) -> NewSafeZone {
        NewSafeZone {
            device_id_fk,
            name: self.name,
            latitude: self.latitude,
            longitude: self.longitude,
            radius: self.radius,
        }
    }
}

/// Response payload for a safe zone.
#[derive(Debug, Clone, Serialize)]
pub struct SafeZoneResponse {
    pub id: i64,
    pub device_id_fk: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub created_at: DateTime<Utc>,
}

impl From<SafeZone> for SafeZoneResponse {
    fn from(zone: SafeZone) -> Self {
        Self {
            id: zone.id,
            device_id_fk: zone.device_id_fk,
            name: zone.name,
            latitude: zone.latitude,
            longitude: zone.longitude,
            radius: zone.radius,
            created_at: zone.created_at,
        }
    }
}

/// Response payload for zone deletion.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteZoneResponse {
    pub status: String,
    pub id: i64,
}
