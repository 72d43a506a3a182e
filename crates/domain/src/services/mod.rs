//! Domain services for the safe zone backend.
//!
//! Services contain business logic that operates on domain models and talk
//! to storage only through the contracts in [`store`].

pub mod location_normalizer;
pub mod store;
pub mod zone_sync;

pub use location_normalizer::{
    to_canonical_local, Clock, LocationNormalizer, SystemClock, DEFAULT_CANONICAL_ZONE,
};
pub use store::{DeviceDirectory, InMemoryStore, LocationStore, ZoneStore};
pub use zone_sync::{plan_new_zones, SyncOutcome, ZoneSynchronizer};
