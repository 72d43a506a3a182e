//! Device domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a registered device in the system.
///
/// `device_id` is the caller-supplied external identifier; `id` is the
/// internal key that locations and zones reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub device_id: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub mac_address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Descriptive attributes used when a device is registered or re-registered.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDevice {
    pub device_id: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub mac_address: Option<String>,
}

impl NewDevice {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }
}
