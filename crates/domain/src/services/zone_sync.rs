//! Safe zone synchronization.
//!
//! A device submits the zones it knows about; every submitted zone that has
//! no counterpart in the cloud copy (by proximity, see
//! [`is_same_zone`](crate::models::safe_zone::is_same_zone)) is added, and the
//! full cloud set is returned so the device can converge its local copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::DomainError;
use crate::models::{Device, NewSafeZone, SafeZone, SubmittedZone, ZoneCandidate};
use crate::services::store::{DeviceDirectory, ZoneStore};

/// Result of a sync call.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Full zone set of the device after the merge.
    pub zones: Vec<SafeZone>,
    /// Number of zones created by this call.
    pub added: usize,
}

/// Per-device serialization point for the fetch-merge-write sequence.
#[derive(Debug, Default)]
struct DeviceLocks {
    locks: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl DeviceLocks {
    async fn acquire(&self, device_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(device_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Decides which candidates are new relative to `baseline`.
///
/// Candidates are checked only against the baseline, never against each
/// other, so two near-identical candidates in one batch are both kept when
/// the baseline has neither.
pub fn plan_new_zones(
    device_id: i64,
    baseline: &[SafeZone],
    candidates: Vec<ZoneCandidate>,
) -> Vec<NewSafeZone> {
    candidates
        .into_iter()
        .filter(|candidate| match baseline.iter().find(|z| z.matches(candidate)) {
            Some(existing) => {
                debug!(
                    zone_id = existing.id,
                    name = %candidate.name,
                    "Submitted zone matches existing zone"
                );
                false
            }
            None => true,
        })
        .map(|candidate| candidate.into_new_zone(device_id))
        .collect()
}

/// Reconciles device-submitted zones with the stored zone set.
#[derive(Clone)]
pub struct ZoneSynchronizer {
    devices: Arc<dyn DeviceDirectory>,
    zones: Arc<dyn ZoneStore>,
    locks: Option<Arc<DeviceLocks>>,
}

impl ZoneSynchronizer {
    /// Creates a synchronizer that serializes sync calls per device.
    pub fn new(devices: Arc<dyn DeviceDirectory>, zones: Arc<dyn ZoneStore>) -> Self {
        Self {
            devices,
            zones,
            locks: Some(Arc::new(DeviceLocks::default())),
        }
    }

    /// Enables or disables per-device serialization of sync calls.
    ///
    /// With serialization disabled, concurrent syncs for one device may both
    /// decide a zone is new and insert near-duplicates.
    pub fn with_serialization(mut self, enabled: bool) -> Self {
        self.locks = if enabled {
            Some(Arc::new(DeviceLocks::default()))
        } else {
            None
        };
        self
    }

    /// Merges `submitted` into the device's zone set and returns the full set.
    pub async fn sync(
        &self,
        external_id: &str,
        submitted: Vec<SubmittedZone>,
    ) -> Result<SyncOutcome, DomainError> {
        let candidates = validate_submission(submitted)?;
        let device = self.resolve_device(external_id).await?;

        let _guard = match &self.locks {
            Some(locks) => Some(locks.acquire(device.id).await),
            None => None,
        };

        let baseline = self.zones.list_zones_for_device(device.id).await?;
        let submitted_count = candidates.len();
        let new_zones = plan_new_zones(device.id, &baseline, candidates);
        let added = new_zones.len();

        if added > 0 {
            self.zones.insert_zones(new_zones).await?;
        }

        let zones = self.zones.list_zones_for_device(device.id).await?;

        info!(
            device_id = %device.device_id,
            submitted = submitted_count,
            zones_added = added,
            total_zones = zones.len(),
            "Zones synchronized"
        );

        Ok(SyncOutcome { zones, added })
    }

    /// Returns every zone of the device.
    pub async fn list(&self, external_id: &str) -> Result<Vec<SafeZone>, DomainError> {
        let device = self.resolve_device(external_id).await?;
        Ok(self.zones.list_zones_for_device(device.id).await?)
    }

    /// Deletes a zone owned by the device.
    ///
    /// Fails with NotFound when the device is unknown or the zone belongs to
    /// another device.
    pub async fn delete(&self, external_id: &str, zone_id: i64) -> Result<(), DomainError> {
        let device = self.resolve_device(external_id).await?;

        if !self.zones.delete_zone(device.id, zone_id).await? {
            return Err(DomainError::zone_not_found());
        }

        info!(device_id = %device.device_id, zone_id, "Zone deleted");
        Ok(())
    }

    async fn resolve_device(&self, external_id: &str) -> Result<Device, DomainError> {
        resolve_active_device(self.devices.as_ref(), external_id).await
    }
}

/// Looks a device up by external id; inactive devices count as unknown.
pub(crate) async fn resolve_active_device(
    devices: &dyn DeviceDirectory,
    external_id: &str,
) -> Result<Device, DomainError> {
    match devices.find_device_by_external_id(external_id).await? {
        Some(device) if device.is_active => Ok(device),
        _ => Err(DomainError::device_not_found()),
    }
}

fn validate_submission(submitted: Vec<SubmittedZone>) -> Result<Vec<ZoneCandidate>, DomainError> {
    submitted
        .into_iter()
        .enumerate()
        .map(|(i, zone)| {
            zone.into_candidate().map_err(|errors| {
                DomainError::Validation(shared::validation::describe_errors(
                    &format!("zones[{}].", i),
                    &errors,
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDevice;
    use crate::services::store::InMemoryStore;
    use crate::StoreError;
    use fake::faker::address::en::CityName;
    use fake::Fake;

    struct Fixture {
        store: Arc<InMemoryStore>,
        sync: ZoneSynchronizer,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        store.register_device(NewDevice::new("device-a"));
        store.register_device(NewDevice::new("device-b"));
        let sync = ZoneSynchronizer::new(store.clone(), store.clone());
        Fixture { store, sync }
    }

    fn zone(lat: f64, lon: f64) -> SubmittedZone {
        let name: String = CityName().fake();
        SubmittedZone::new(name, lat, lon)
    }

    #[tokio::test]
    async fn test_sync_adds_new_zones_and_returns_full_set() {
        let f = fixture();
        let outcome = f
            .sync
            .sync("device-a", vec![zone(25.6866, -100.3161), zone(25.7, -100.2)])
            .await
            .unwrap();

        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.zones.len(), 2);
        assert!(outcome.zones.iter().all(|z| z.radius == 100.0));
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let f = fixture();
        let submitted = vec![zone(25.6866, -100.3161), zone(25.7, -100.2)];

        let first = f.sync.sync("device-a", submitted.clone()).await.unwrap();
        let writes_after_first = f.store.zone_write_count();
        let second = f.sync.sync("device-a", submitted).await.unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(first.zones, second.zones);
        assert_eq!(f.store.zone_write_count(), writes_after_first);
    }

    #[tokio::test]
    async fn test_all_duplicates_returns_baseline_without_write() {
        let f = fixture();
        let baseline = f
            .sync
            .sync("device-a", vec![zone(10.0, 10.0)])
            .await
            .unwrap()
            .zones;
        let writes = f.store.zone_write_count();

        let outcome = f
            .sync
            .sync("device-a", vec![SubmittedZone::new("Renamed", 10.00005, 9.99995)])
            .await
            .unwrap();

        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.zones, baseline);
        assert_eq!(outcome.zones[0].name, baseline[0].name);
        assert_eq!(f.store.zone_write_count(), writes);
    }

    #[tokio::test]
    async fn test_empty_submission_returns_baseline() {
        let f = fixture();
        f.sync.sync("device-a", vec![zone(1.0, 1.0)]).await.unwrap();

        let outcome = f.sync.sync("device-a", vec![]).await.unwrap();
        assert_eq!(outcome.added, 0);
        assert_eq!(outcome.zones.len(), 1);
    }

    #[tokio::test]
    async fn test_proximity_threshold_is_strict() {
        let f = fixture();
        f.sync.sync("device-a", vec![zone(0.0, 0.0)]).await.unwrap();

        let at_threshold = f
            .sync
            .sync("device-a", vec![zone(0.0001, 0.0001)])
            .await
            .unwrap();
        assert_eq!(at_threshold.added, 1);

        let f = fixture();
        f.sync.sync("device-a", vec![zone(0.0, 0.0)]).await.unwrap();
        let below = f
            .sync
            .sync("device-a", vec![zone(0.00009, 0.00009)])
            .await
            .unwrap();
        assert_eq!(below.added, 0);
    }

    #[tokio::test]
    async fn test_batch_members_are_not_deduplicated_against_each_other() {
        let f = fixture();
        let outcome = f
            .sync
            .sync("device-a", vec![zone(5.0, 5.0), zone(5.00001, 5.00001)])
            .await
            .unwrap();

        assert_eq!(outcome.added, 2);
    }

    #[tokio::test]
    async fn test_zones_are_scoped_per_device() {
        let f = fixture();
        f.sync.sync("device-a", vec![zone(3.0, 3.0)]).await.unwrap();

        let other = f.sync.sync("device-b", vec![zone(3.0, 3.0)]).await.unwrap();
        assert_eq!(other.added, 1);
        assert_eq!(f.sync.list("device-a").await.unwrap().len(), 1);
        assert_eq!(f.sync.list("device-b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_unknown_device_is_not_found_without_writes() {
        let f = fixture();
        let result = f.sync.sync("nope", vec![zone(1.0, 1.0)]).await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert_eq!(f.store.zone_write_count(), 0);
        assert_eq!(f.store.zone_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_inactive_device_is_not_found() {
        let f = fixture();
        f.store.deactivate_device("device-a");

        let result = f.sync.sync("device-a", vec![zone(1.0, 1.0)]).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sync_rejects_zone_without_coordinates_before_writing() {
        let f = fixture();
        let bad = SubmittedZone {
            name: Some("Nowhere".to_string()),
            ..Default::default()
        };

        let result = f.sync.sync("device-a", vec![zone(1.0, 1.0), bad]).await;
        match result {
            Err(DomainError::Validation(msg)) => assert!(msg.contains("zones[1].latitude")),
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert_eq!(f.store.zone_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_store_failure_is_surfaced_and_commits_nothing() {
        let f = fixture();
        f.store.set_failing(true);

        let result = f.sync.sync("device-a", vec![zone(1.0, 1.0)]).await;
        assert!(matches!(result, Err(DomainError::Store(StoreError::Unavailable(_)))));
        f.store.set_failing(false);
        assert!(f.sync.list("device-a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_mid_batch_failure_keeps_baseline_only() {
        let f = fixture();
        f.sync.sync("device-a", vec![zone(10.0, 10.0)]).await.unwrap();
        f.store.fail_zone_inserts_after(Some(1));

        let result = f
            .sync
            .sync("device-a", vec![zone(1.0, 1.0), zone(2.0, 2.0), zone(3.0, 3.0)])
            .await;
        assert!(matches!(result, Err(DomainError::Store(StoreError::Query(_)))));

        f.store.fail_zone_inserts_after(None);
        let zones = f.sync.list("device-a").await.unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].latitude, 10.0);
    }

    #[tokio::test]
    async fn test_delete_own_zone() {
        let f = fixture();
        let zones = f.sync.sync("device-a", vec![zone(2.0, 2.0)]).await.unwrap().zones;

        f.sync.delete("device-a", zones[0].id).await.unwrap();
        assert!(f.sync.list("device-a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_other_devices_zone_is_not_found() {
        let f = fixture();
        let zones = f.sync.sync("device-a", vec![zone(2.0, 2.0)]).await.unwrap().zones;

        let result = f.sync.delete("device-b", zones[0].id).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert_eq!(f.sync.list("device-a").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_device_or_zone() {
        let f = fixture();
        assert!(matches!(
            f.sync.delete("ghost", 1).await,
            Err(DomainError::NotFound(_))
        ));
        assert!(matches!(
            f.sync.delete("device-a", 999).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_unknown_device() {
        let f = fixture();
        assert!(matches!(
            f.sync.list("ghost").await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_syncs_do_not_duplicate_when_serialized() {
        let f = fixture();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sync = f.sync.clone();
            handles.push(tokio::spawn(async move {
                sync.sync("device-a", vec![SubmittedZone::new("Home", 25.0, -100.0)])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(f.sync.list("device-a").await.unwrap().len(), 1);
    }

    #[test]
    fn test_plan_new_zones_keeps_order() {
        let candidates = vec![
            SubmittedZone::new("B", 2.0, 2.0).into_candidate().unwrap(),
            SubmittedZone::new("A", 1.0, 1.0).into_candidate().unwrap(),
        ];
        let planned = plan_new_zones(9, &[], candidates);
        let names: Vec<&str> = planned.iter().map(|z| z.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(planned.iter().all(|z| z.device_id_fk == 9));
    }

    #[tokio::test]
    async fn test_device_locks_are_pruned() {
        let locks = DeviceLocks::default();
        {
            let _a = locks.acquire(1).await;
        }
        let _b = locks.acquire(2).await;
        let held = locks.locks.lock().unwrap().len();
        assert_eq!(held, 1);
    }
}
