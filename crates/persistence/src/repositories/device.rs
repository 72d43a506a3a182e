//! Device repository for database operations.

use async_trait::async_trait;
use domain::models::{Device, NewDevice};
use domain::services::DeviceDirectory;
use domain::StoreError;
use sqlx::PgPool;

use crate::entities::DeviceEntity;
use crate::metrics::QueryTimer;

/// Repository for device-related database operations.
#[derive(Clone)]
pub struct DeviceRepository {
    pool: PgPool,
}

impl DeviceRepository {
    /// Creates a new DeviceRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a device by its external identifier.
    pub async fn find_by_device_id(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_device_by_device_id");
        let result = sqlx::query_as::<_, DeviceEntity>(
            r#"
            SELECT id, device_id, name, brand, model, mac_address, is_active, created_at
            FROM devices
            WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Upsert a device (insert or update on conflict).
    ///
    /// Attributes left as `None` keep their stored value; re-registration
    /// reactivates a deactivated device.
    pub async fn upsert(&self, device: &NewDevice) -> Result<DeviceEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_device");
        let result = sqlx::query_as::<_, DeviceEntity>(
            r#"
            INSERT INTO devices (device_id, name, brand, model, mac_address)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (device_id) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, devices.name),
                brand = COALESCE(EXCLUDED.brand, devices.brand),
                model = COALESCE(EXCLUDED.model, devices.model),
                mac_address = COALESCE(EXCLUDED.mac_address, devices.mac_address),
                is_active = TRUE
            RETURNING id, device_id, name, brand, model, mac_address, is_active, created_at
            "#,
        )
        .bind(&device.device_id)
        .bind(&device.name)
        .bind(&device.brand)
        .bind(&device.model)
        .bind(&device.mac_address)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Soft-delete a device. Returns the number of rows updated (0 or 1).
    pub async fn deactivate(&self, device_id: &str) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("deactivate_device");
        let result = sqlx::query(
            r#"
            UPDATE devices SET is_active = FALSE WHERE device_id = $1
            "#,
        )
        .bind(device_id)
        .execute(&self.pool)
        .await;
        timer.finish(&result);
        Ok(result?.rows_affected())
    }
}

#[async_trait]
impl DeviceDirectory for DeviceRepository {
    async fn find_device_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Device>, StoreError> {
        Ok(self.find_by_device_id(external_id).await?.map(Device::from))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::metrics::record_pool_metrics(&self.pool);
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
