pub mod backend;
pub mod client;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod layout;
pub mod models;
pub mod pricing;
pub mod redis_client;
pub mod services;

use axum::{routing::get, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use backend::{InMemoryBackend, PersistentBackend, SeatBackend};
use clock::SystemClock;
use config::StorageConfig;

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn SeatBackend>,
    pub config: config::Config,
}

impl AppState {
    /// Connects the configured storage and prepares it for serving.
    pub async fn new(config: config::Config) -> Result<Arc<Self>, Box<dyn std::error::Error + Send + Sync>> {
        let clock = Arc::new(SystemClock);
        let ttl = config.holds.ttl()?;

        let backend: Arc<dyn SeatBackend> = match &config.storage {
            StorageConfig::Memory { seed_file } => {
                let backend = InMemoryBackend::new(clock, ttl);
                if let Some(path) = seed_file {
                    let count = backend.load_seed(Path::new(path)).await?;
                    info!("Seeded {} events from {}", count, path);
                }
                Arc::new(backend)
            }
            StorageConfig::Persistent { database, redis, seed_file } => {
                let db = database::Database::connect(database).await?;
                info!("Database connected");
                db.run_migrations().await?;

                let redis = redis_client::RedisClient::new(&redis.url).await?;
                info!("Redis connected");

                let backend = PersistentBackend::new(db, redis, clock, ttl);
                if let Some(path) = seed_file {
                    let raw = tokio::fs::read_to_string(path).await?;
                    let seed: backend::memory::SeedData = serde_json::from_str(&raw)?;
                    let mut imported = 0;
                    for event in &seed.events {
                        if backend.import_event(&event.chart, &event.tiers).await? {
                            imported += 1;
                        }
                    }
                    info!("Imported {} of {} seed events from {}", imported, seed.events.len(), path);
                }
                backend.warmup().await?;
                Arc::new(backend)
            }
        };

        Ok(Arc::new(Self { backend, config }))
    }

    pub fn with_backend(backend: Arc<dyn SeatBackend>, config: config::Config) -> Arc<Self> {
        Arc::new(Self { backend, config })
    }
}

/// Full HTTP application: health routes plus the `/api` surface.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Seat hold service v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
