//! Device entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the devices table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceEntity {
    pub id: i64,
    pub device_id: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub mac_address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DeviceEntity> for domain::models::Device {
    fn from(entity: DeviceEntity) -> Self {
        Self {
            id: entity.id,
            device_id: entity.device_id,
            name: entity.name,
            brand: entity.brand,
            model: entity.model,
            mac_address: entity.mac_address,
            is_active: entity.is_active,
            created_at: entity.created_at,
        }
    }
}
