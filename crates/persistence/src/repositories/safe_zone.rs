//! Safe zone repository for database operations.

use async_trait::async_trait;
use domain::models::{NewSafeZone, SafeZone};
use domain::services::ZoneStore;
use domain::StoreError;
use sqlx::PgPool;

use crate::entities::SafeZoneEntity;
use crate::metrics::QueryTimer;

/// Repository for safe zone database operations.
#[derive(Clone)]
pub struct SafeZoneRepository {
    pool: PgPool,
}

impl SafeZoneRepository {
    /// Creates a new SafeZoneRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All zones of a device, oldest first.
    pub async fn find_by_device(&self, device_id_fk: i64) -> Result<Vec<SafeZoneEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_safe_zones_by_device");
        let result = sqlx::query_as::<_, SafeZoneEntity>(
            r#"
            SELECT id, device_id_fk, name, latitude, longitude, radius, created_at
            FROM safe_zones
            WHERE device_id_fk = $1
            ORDER BY id
            "#,
        )
        .bind(device_id_fk)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Insert a batch of zones in one transaction.
    pub async fn create_many(&self, zones: &[NewSafeZone]) -> Result<Vec<SafeZoneEntity>, sqlx::Error> {
        let timer = QueryTimer::new("create_safe_zones");
        let result = self.insert_in_transaction(zones).await;
        timer.finish(&result);
        result
    }

    async fn insert_in_transaction(
        &self,
        zones: &[NewSafeZone],
    ) -> Result<Vec<SafeZoneEntity>, sqlx::Error> {
        // All or nothing: a failure part-way rolls back when `tx` is dropped
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(zones.len());
        for zone in zones {
            let entity = sqlx::query_as::<_, SafeZoneEntity>(
                r#"
                INSERT INTO safe_zones (device_id_fk, name, latitude, longitude, radius)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, device_id_fk, name, latitude, longitude, radius, created_at
                "#,
            )
            .bind(zone.device_id_fk)
            .bind(&zone.name)
            .bind(zone.latitude)
            .bind(zone.longitude)
            .bind(zone.radius)
            .fetch_one(&mut *tx)
            .await?;
            created.push(entity);
        }
        tx.commit().await?;
        Ok(created)
    }

    /// Delete a zone owned by the given device.
    /// Returns the number of rows deleted (0 or 1).
    pub async fn delete(&self, device_id_fk: i64, zone_id: i64) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_safe_zone");
        let result = sqlx::query(
            r#"
            DELETE FROM safe_zones WHERE id = $1 AND device_id_fk = $2
            "#,
        )
        .bind(zone_id)
        .bind(device_id_fk)
        .execute(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.rows_affected())
    }
}

#[async_trait]
impl ZoneStore for SafeZoneRepository {
    async fn list_zones_for_device(&self, device_id: i64) -> Result<Vec<SafeZone>, StoreError> {
        let zones = self.find_by_device(device_id).await?;
        Ok(zones.into_iter().map(SafeZone::from).collect())
    }

    async fn insert_zones(&self, zones: Vec<NewSafeZone>) -> Result<Vec<SafeZone>, StoreError> {
        let created = self.create_many(&zones).await?;
        Ok(created.into_iter().map(SafeZone::from).collect())
    }

    async fn delete_zone(&self, device_id: i64, zone_id: i64) -> Result<bool, StoreError> {
        Ok(self.delete(device_id, zone_id).await? > 0)
    }
}
