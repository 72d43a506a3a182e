//! Store contracts consumed by the synchronizer and the normalizer.
//!
//! The PostgreSQL implementations live in the `persistence` crate.
//! [`InMemoryStore`] implements every contract for tests and local runs.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDateTime, Utc};

use crate::error::StoreError;
use crate::models::{Device, Location, NewDevice, NewLocation, NewSafeZone, SafeZone};

/// Device lookup by external identifier.
#[async_trait::async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Returns the device with the given external id, active or not.
    async fn find_device_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Device>, StoreError>;

    /// Cheap connectivity check used by readiness probes.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Safe zone persistence.
#[async_trait::async_trait]
pub trait ZoneStore: Send + Sync {
    /// All zones of a device, ordered by id.
    async fn list_zones_for_device(&self, device_id: i64) -> Result<Vec<SafeZone>, StoreError>;

    /// Inserts all zones as one unit. Either every zone is persisted or none is.
    async fn insert_zones(&self, zones: Vec<NewSafeZone>) -> Result<Vec<SafeZone>, StoreError>;

    /// Deletes a zone only if it belongs to `device_id`. Returns whether a row was removed.
    async fn delete_zone(&self, device_id: i64, zone_id: i64) -> Result<bool, StoreError>;
}

/// Location sample persistence.
#[async_trait::async_trait]
pub trait LocationStore: Send + Sync {
    async fn insert_location(&self, location: NewLocation) -> Result<Location, StoreError>;

    /// Samples with `start <= timestamp <= end`, ascending by timestamp.
    async fn query_locations_in_range(
        &self,
        device_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Location>, StoreError>;

    /// Most recent sample by event timestamp.
    async fn latest_location(&self, device_id: i64) -> Result<Option<Location>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    devices: Vec<Device>,
    zones: Vec<SafeZone>,
    locations: Vec<Location>,
    next_device_id: i64,
    next_zone_id: i64,
    next_location_id: i64,
}

/// In-memory implementation of every store contract.
///
/// Counts write operations so tests can assert that no write was issued.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    zone_writes: AtomicUsize,
    location_writes: AtomicUsize,
    failing: AtomicBool,
    zone_insert_limit: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store set to fail".to_string()))
        } else {
            Ok(())
        }
    }

    /// Makes every subsequent store call fail with [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes the next zone batches fail after `limit` zones have been staged,
    /// as a database would on a mid-transaction error. `None` clears it.
    pub fn fail_zone_inserts_after(&self, limit: Option<usize>) {
        *self
            .zone_insert_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = limit;
    }

    /// Registers a device, or refreshes the attributes of an existing one.
    /// Re-registration reactivates a soft-deleted device.
    pub fn register_device(&self, new_device: NewDevice) -> Device {
        let mut state = self.state();
        if let Some(existing) = state
            .devices
            .iter_mut()
            .find(|d| d.device_id == new_device.device_id)
        {
            existing.name = new_device.name.or(existing.name.take());
            existing.brand = new_device.brand.or(existing.brand.take());
            existing.model = new_device.model.or(existing.model.take());
            existing.mac_address = new_device.mac_address.or(existing.mac_address.take());
            existing.is_active = true;
            return existing.clone();
        }

        state.next_device_id += 1;
        let device = Device {
            id: state.next_device_id,
            device_id: new_device.device_id,
            name: new_device.name,
            brand: new_device.brand,
            model: new_device.model,
            mac_address: new_device.mac_address,
            is_active: true,
            created_at: Utc::now(),
        };
        state.devices.push(device.clone());
        device
    }

    /// Soft-deletes a device. Returns whether the device existed.
    pub fn deactivate_device(&self, external_id: &str) -> bool {
        let mut state = self.state();
        match state.devices.iter_mut().find(|d| d.device_id == external_id) {
            Some(device) => {
                device.is_active = false;
                true
            }
            None => false,
        }
    }

    /// Number of zone write operations (inserts and deletes) issued so far.
    pub fn zone_write_count(&self) -> usize {
        self.zone_writes.load(Ordering::SeqCst)
    }

    /// Number of location inserts issued so far.
    pub fn location_write_count(&self) -> usize {
        self.location_writes.load(Ordering::SeqCst)
    }

    /// Total number of zones across all devices.
    pub fn zone_count(&self) -> usize {
        self.state().zones.len()
    }

    /// Total number of location samples across all devices.
    pub fn location_count(&self) -> usize {
        self.state().locations.len()
    }
}

#[async_trait::async_trait]
impl DeviceDirectory for InMemoryStore {
    async fn find_device_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Device>, StoreError> {
        self.check_available()?;
        Ok(self
            .state()
            .devices
            .iter()
            .find(|d| d.device_id == external_id)
            .cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}

#[async_trait::async_trait]
impl ZoneStore for InMemoryStore {
    async fn list_zones_for_device(&self, device_id: i64) -> Result<Vec<SafeZone>, StoreError> {
        self.check_available()?;
        let mut zones: Vec<SafeZone> = self
            .state()
            .zones
            .iter()
            .filter(|z| z.device_id_fk == device_id)
            .cloned()
            .collect();
        zones.sort_by_key(|z| z.id);
        Ok(zones)
    }

    async fn insert_zones(&self, zones: Vec<NewSafeZone>) -> Result<Vec<SafeZone>, StoreError> {
        self.zone_writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let limit = *self
            .zone_insert_limit
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut state = self.state();
        let now = Utc::now();
        let mut next_id = state.next_zone_id;
        let mut inserted = Vec::with_capacity(zones.len());
        for zone in zones {
            if limit.is_some_and(|limit| inserted.len() >= limit) {
                return Err(StoreError::Query(format!(
                    "insert aborted after {} of the batch",
                    inserted.len()
                )));
            }
            next_id += 1;
            inserted.push(SafeZone {
                id: next_id,
                device_id_fk: zone.device_id_fk,
                name: zone.name,
                latitude: zone.latitude,
                longitude: zone.longitude,
                radius: zone.radius,
                created_at: now,
            });
        }
        state.next_zone_id = next_id;
        state.zones.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn delete_zone(&self, device_id: i64, zone_id: i64) -> Result<bool, StoreError> {
        self.zone_writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.state();
        let before = state.zones.len();
        state
            .zones
            .retain(|z| !(z.id == zone_id && z.device_id_fk == device_id));
        Ok(state.zones.len() < before)
    }
}

#[async_trait::async_trait]
impl LocationStore for InMemoryStore {
    async fn insert_location(&self, location: NewLocation) -> Result<Location, StoreError> {
        self.location_writes.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut state = self.state();
        state.next_location_id += 1;
        let stored = Location {
            id: state.next_location_id,
            device_id_fk: location.device_id_fk,
            latitude: location.latitude,
            longitude: location.longitude,
            timestamp: location.timestamp,
            server_received_at: location.server_received_at,
        };
        state.locations.push(stored.clone());
        Ok(stored)
    }

    async fn query_locations_in_range(
        &self,
        device_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Location>, StoreError> {
        self.check_available()?;
        let mut locations: Vec<Location> = self
            .state()
            .locations
            .iter()
            .filter(|l| l.device_id_fk == device_id && l.timestamp >= start && l.timestamp <= end)
            .cloned()
            .collect();
        locations.sort_by_key(|l| (l.timestamp, l.id));
        Ok(locations)
    }

    async fn latest_location(&self, device_id: i64) -> Result<Option<Location>, StoreError> {
        self.check_available()?;
        Ok(self
            .state()
            .locations
            .iter()
            .filter(|l| l.device_id_fk == device_id)
            .max_by_key(|l| (l.timestamp, l.id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_zone(device_id: i64, name: &str) -> NewSafeZone {
        NewSafeZone {
            device_id_fk: device_id,
            name: name.to_string(),
            latitude: 25.0,
            longitude: -100.0,
            radius: 100.0,
        }
    }

    #[test]
    fn test_register_device_upserts() {
        let store = InMemoryStore::new();
        let first = store.register_device(NewDevice {
            device_id: "abc".to_string(),
            name: Some("Phone".to_string()),
            ..Default::default()
        });
        let second = store.register_device(NewDevice {
            device_id: "abc".to_string(),
            model: Some("Pixel".to_string()),
            ..Default::default()
        });

        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Phone"));
        assert_eq!(second.model.as_deref(), Some("Pixel"));
    }

    #[test]
    fn test_register_reactivates_device() {
        let store = InMemoryStore::new();
        store.register_device(NewDevice::new("abc"));
        assert!(store.deactivate_device("abc"));
        assert!(store.register_device(NewDevice::new("abc")).is_active);
        assert!(!store.deactivate_device("missing"));
    }

    #[tokio::test]
    async fn test_zone_listing_is_scoped_to_device() {
        let store = InMemoryStore::new();
        store
            .insert_zones(vec![new_zone(1, "A"), new_zone(2, "B"), new_zone(1, "C")])
            .await
            .unwrap();

        let zones = store.list_zones_for_device(1).await.unwrap();
        let names: Vec<&str> = zones.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_delete_zone_requires_owner() {
        let store = InMemoryStore::new();
        let inserted = store.insert_zones(vec![new_zone(1, "A")]).await.unwrap();
        let zone_id = inserted[0].id;

        assert!(!store.delete_zone(2, zone_id).await.unwrap());
        assert_eq!(store.zone_count(), 1);
        assert!(store.delete_zone(1, zone_id).await.unwrap());
        assert_eq!(store.zone_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_store_inserts_nothing() {
        let store = InMemoryStore::new();
        store.set_failing(true);

        let result = store.insert_zones(vec![new_zone(1, "A"), new_zone(1, "B")]).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.zone_count(), 0);
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_mid_batch_failure_rolls_back_staged_zones() {
        let store = InMemoryStore::new();
        store.fail_zone_inserts_after(Some(2));

        let result = store
            .insert_zones(vec![new_zone(1, "A"), new_zone(1, "B"), new_zone(1, "C")])
            .await;
        assert!(matches!(result, Err(StoreError::Query(_))));
        assert_eq!(store.zone_count(), 0);

        store.fail_zone_inserts_after(None);
        let inserted = store.insert_zones(vec![new_zone(1, "A")]).await.unwrap();
        assert_eq!(inserted[0].id, 1);
    }

    #[tokio::test]
    async fn test_range_query_is_inclusive_and_sorted() {
        let store = InMemoryStore::new();
        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap();
        for ts in ["2024-03-01T12:00:00", "2024-03-01T08:00:00", "2024-03-01T10:00:00"] {
            store
                .insert_location(NewLocation {
                    device_id_fk: 1,
                    latitude: 0.0,
                    longitude: 0.0,
                    timestamp: at(ts),
                    server_received_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let found = store
            .query_locations_in_range(1, at("2024-03-01T08:00:00"), at("2024-03-01T10:00:00"))
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].timestamp < found[1].timestamp);

        let latest = store.latest_location(1).await.unwrap().unwrap();
        assert_eq!(latest.timestamp, at("2024-03-01T12:00:00"));
        assert!(store.latest_location(2).await.unwrap().is_none());
    }
}
