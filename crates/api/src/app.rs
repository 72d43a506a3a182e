use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use domain::services::{
    DeviceDirectory, InMemoryStore, LocationNormalizer, LocationStore, ZoneStore,
    ZoneSynchronizer,
};
use persistence::repositories::{DeviceRepository, LocationRepository, SafeZoneRepository};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{Config, ConfigValidationError};
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{health, locations, zones};

/// Storage backends behind the domain services.
#[derive(Clone)]
pub struct Stores {
    pub devices: Arc<dyn DeviceDirectory>,
    pub zones: Arc<dyn ZoneStore>,
    pub locations: Arc<dyn LocationStore>,
}

impl Stores {
    /// PostgreSQL repositories sharing one pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            devices: Arc::new(DeviceRepository::new(pool.clone())),
            zones: Arc::new(SafeZoneRepository::new(pool.clone())),
            locations: Arc::new(LocationRepository::new(pool)),
        }
    }

    /// One in-memory store serving every contract.
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            devices: store.clone(),
            zones: store.clone(),
            locations: store,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub devices: Arc<dyn DeviceDirectory>,
    pub synchronizer: ZoneSynchronizer,
    pub normalizer: LocationNormalizer,
}

impl AppState {
    pub fn new(config: Config, stores: Stores) -> Result<Self, ConfigValidationError> {
        let zone = config.canonical_zone()?;

        let synchronizer = ZoneSynchronizer::new(stores.devices.clone(), stores.zones)
            .with_serialization(config.sync.serialize_per_device);
        let normalizer =
            LocationNormalizer::new(stores.devices.clone(), stores.locations).with_zone(zone);

        Ok(Self {
            config: Arc::new(config),
            devices: stores.devices,
            synchronizer,
            normalizer,
        })
    }
}

pub fn create_app(config: Config, stores: Stores) -> Result<Router, ConfigValidationError> {
    let state = AppState::new(config, stores)?;
    Ok(build_router(state))
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api_routes = Router::new()
        .route(
            "/api/v1/zones/:device_id",
            get(zones::list_zones).post(zones::sync_zones),
        )
        .route(
            "/api/v1/zones/:device_id/:zone_id",
            delete(zones::delete_zone),
        )
        .route("/api/v1/locations", post(locations::ingest_location))
        .route(
            "/api/v1/locations/:device_id/history",
            get(locations::location_history),
        )
        .route(
            "/api/v1/locations/:device_id/latest",
            get(locations::latest_location),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config))
        .with_state(state)
}
