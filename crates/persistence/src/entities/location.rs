//! Location entity (database row mapping).

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the locations table.
///
/// `timestamp` is a `TIMESTAMP WITHOUT TIME ZONE` column holding canonical
/// local civil time.
#[derive(Debug, Clone, FromRow)]
pub struct LocationEntity {
    pub id: i64,
    pub device_id_fk: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: NaiveDateTime,
    pub server_received_at: DateTime<Utc>,
}

impl From<LocationEntity> for domain::models::Location {
    fn from(entity: LocationEntity) -> Self {
        Self {
            id: entity.id,
            device_id_fk: entity.device_id_fk,
            latitude: entity.latitude,
            longitude: entity.longitude,
            timestamp: entity.timestamp,
            server_received_at: entity.server_received_at,
        }
    }
}
