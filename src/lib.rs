use std::sync::Arc;

use config::Config;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::geofence::SafeZoneRegistry;
use crate::routes::plant::PlantIdClient;
use crate::service::LocationIngestService;
use crate::store::{AlertStore, GroupStore, LocationStore, PgStore};

pub mod config;
pub mod geofence;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis: Arc<RedisClient>,
    pub store: PgStore,
    pub registry: Arc<SafeZoneRegistry>,
    pub ingest: Arc<LocationIngestService>,
    pub plants: PlantIdClient,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, redis: Arc<RedisClient>) -> Self {
        let store = PgStore::new(pool.clone(), Arc::clone(&redis));
        let registry = Arc::new(SafeZoneRegistry::new());

        // 三个存储协作方都由同一个PgStore承担
        let shared = Arc::new(store.clone());
        let ingest = Arc::new(LocationIngestService::new(
            Arc::clone(&shared) as Arc<dyn GroupStore>,
            Arc::clone(&shared) as Arc<dyn LocationStore>,
            shared as Arc<dyn AlertStore>,
            Arc::clone(&registry),
        ));

        let plants = PlantIdClient::new(&config);

        Self {
            pool,
            config,
            redis,
            store,
            registry,
            ingest,
            plants,
        }
    }
}
