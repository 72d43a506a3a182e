//! Location repository for database operations.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use domain::models::{Location, NewLocation};
use domain::services::LocationStore;
use domain::StoreError;
use sqlx::PgPool;

use crate::entities::LocationEntity;
use crate::metrics::QueryTimer;

/// Repository for location-related database operations.
#[derive(Clone)]
pub struct LocationRepository {
    pool: PgPool,
}

impl LocationRepository {
    /// Creates a new LocationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a single location sample.
    pub async fn insert(&self, location: &NewLocation) -> Result<LocationEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_location");
        let result = sqlx::query_as::<_, LocationEntity>(
            r#"
            INSERT INTO locations (device_id_fk, latitude, longitude, "timestamp", server_received_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, device_id_fk, latitude, longitude, "timestamp", server_received_at
            "#,
        )
        .bind(location.device_id_fk)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(location.timestamp)
        .bind(location.server_received_at)
        .fetch_one(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Samples of a device within `[start, end]`, ascending by timestamp.
    pub async fn find_in_range(
        &self,
        device_id_fk: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<LocationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_locations_in_range");
        let result = sqlx::query_as::<_, LocationEntity>(
            r#"
            SELECT id, device_id_fk, latitude, longitude, "timestamp", server_received_at
            FROM locations
            WHERE device_id_fk = $1 AND "timestamp" >= $2 AND "timestamp" <= $3
            ORDER BY "timestamp" ASC, id ASC
            "#,
        )
        .bind(device_id_fk)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await;
        timer.finish(&result);
        result
    }

    /// Most recent sample of a device by event time.
    pub async fn find_latest(&self, device_id_fk: i64) -> Result<Option<LocationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_latest_location");
        let result = sqlx::query_as::<_, LocationEntity>(
            r#"
            SELECT id, device_id_fk, latitude, longitude, "timestamp", server_received_at
            FROM locations
            WHERE device_id_fk = $1
            ORDER BY "timestamp" DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(device_id_fk)
        .fetch_optional(&self.pool)
        .await;
        timer.finish(&result);
        result
    }
}

#[async_trait]
impl LocationStore for LocationRepository {
    async fn insert_location(&self, location: NewLocation) -> Result<Location, StoreError> {
        Ok(self.insert(&location).await?.into())
    }

    async fn query_locations_in_range(
        &self,
        device_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Location>, StoreError> {
        let locations = self.find_in_range(device_id, start, end).await?;
        Ok(locations.into_iter().map(Location::from).collect())
    }

    async fn latest_location(&self, device_id: i64) -> Result<Option<Location>, StoreError> {
        Ok(self.find_latest(device_id).await?.map(Location::from))
    }
}
