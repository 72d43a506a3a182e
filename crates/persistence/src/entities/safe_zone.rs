//! Safe zone entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the safe_zones table.
#[derive(Debug, Clone, FromRow)]
pub struct SafeZoneEntity {
    pub id: i64,
    pub device_id_fk: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub created_at: DateTime<Utc>,
}

impl From<SafeZoneEntity> for domain::models::SafeZone {
    fn from(entity: SafeZoneEntity) -> Self {
        Self {
            id: entity.id,
            device_id_fk: entity.device_id_fk,
            name: entity.name,
            latitude: entity.latitude,
            longitude: entity.longitude,
            radius: entity.radius,
            created_at: entity.created_at,
        }
    }
}
