//! Location ingestion and history reads.
//!
//! Event timestamps are converted to the canonical local zone and stored
//! without a zone annotation; arrival time is stored in UTC.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use shared::time::ReportedTimestamp;
use tracing::{debug, info};
use validator::Validate;

use crate::error::DomainError;
use crate::models::{IngestLocationRequest, Location, NewLocation};
use crate::services::store::{DeviceDirectory, LocationStore};
use crate::services::zone_sync::resolve_active_device;

/// Zone that stored event timestamps are expressed in unless configured otherwise.
pub const DEFAULT_CANONICAL_ZONE: Tz = chrono_tz::America::Monterrey;

/// Source of the server receive time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Converts a reported timestamp to civil time in `zone`.
///
/// A timestamp without offset is taken to be UTC.
pub fn to_canonical_local(reported: &ReportedTimestamp, zone: Tz) -> NaiveDateTime {
    reported.to_utc().with_timezone(&zone).naive_local()
}

/// Normalizes and stores location samples and serves range reads.
#[derive(Clone)]
pub struct LocationNormalizer {
    devices: Arc<dyn DeviceDirectory>,
    locations: Arc<dyn LocationStore>,
    zone: Tz,
    clock: Arc<dyn Clock>,
}

impl LocationNormalizer {
    pub fn new(devices: Arc<dyn DeviceDirectory>, locations: Arc<dyn LocationStore>) -> Self {
        Self {
            devices,
            locations,
            zone: DEFAULT_CANONICAL_ZONE,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the zone event timestamps are stored in.
    pub fn with_zone(mut self, zone: Tz) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Stores one location sample for a registered device.
    pub async fn ingest(&self, request: IngestLocationRequest) -> Result<Location, DomainError> {
        request.validate().map_err(|errors| {
            DomainError::Validation(shared::validation::describe_errors("", &errors))
        })?;

        let device = resolve_active_device(self.devices.as_ref(), &request.device_unique_id).await?;

        let new_location = NewLocation {
            device_id_fk: device.id,
            latitude: request.latitude,
            longitude: request.longitude,
            timestamp: to_canonical_local(&request.timestamp, self.zone),
            server_received_at: self.clock.now(),
        };

        let location = self.locations.insert_location(new_location).await?;

        info!(
            device_id = %device.device_id,
            location_id = location.id,
            timestamp = %location.timestamp,
            "Location recorded"
        );

        Ok(location)
    }

    /// Samples of a device with `start <= timestamp <= end`, oldest first.
    ///
    /// Bounds are compared by their wall-clock fields; any offset they carry
    /// is dropped without conversion.
    pub async fn history(
        &self,
        external_id: &str,
        start: ReportedTimestamp,
        end: ReportedTimestamp,
    ) -> Result<Vec<Location>, DomainError> {
        let device = resolve_active_device(self.devices.as_ref(), external_id).await?;

        let (start, end) = (start.wall_clock(), end.wall_clock());
        if start > end {
            debug!(device_id = %device.device_id, %start, %end, "Empty history range");
            return Ok(Vec::new());
        }

        let locations = self
            .locations
            .query_locations_in_range(device.id, start, end)
            .await?;

        debug!(
            device_id = %device.device_id,
            count = locations.len(),
            "Location history retrieved"
        );

        Ok(locations)
    }

    /// Most recent sample of a device, if it has any.
    pub async fn latest(&self, external_id: &str) -> Result<Option<Location>, DomainError> {
        let device = resolve_active_device(self.devices.as_ref(), external_id).await?;
        Ok(self.locations.latest_location(device.id).await?)
    }
}
