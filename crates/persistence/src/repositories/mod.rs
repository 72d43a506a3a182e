//! Repository implementations for database operations.
//!
//! Each repository also implements the matching store contract from
//! `domain::services::store`.

pub mod device;
pub mod location;
pub mod safe_zone;

pub use device::DeviceRepository;
pub use location::LocationRepository;
pub use safe_zone::SafeZoneRepository;
