//! Domain models for the GPS tracker.

pub mod device;
pub mod location;
pub mod safe_zone;

pub use device::{Device, NewDevice};
pub use location::{IngestLocationRequest, Location, LocationHistoryQuery, NewLocation};
pub use safe_zone::{NewSafeZone, SafeZone, SubmittedZone, ZoneCandidate};
