//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod device;
pub mod location;
pub mod safe_zone;

pub use device::DeviceEntity;
pub use location::LocationEntity;
pub use safe_zone::SafeZoneEntity;
