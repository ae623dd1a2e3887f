use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seat_holds::{
    app,
    config::{Config, LogFormat},
    services::cleanup::CleanupService,
    AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let registry = tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&config.app.rust_log));
    match config.app.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    info!("Starting seat hold service");

    let app_state = AppState::new(config.clone())
        .await
        .map_err(|e| anyhow::anyhow!("failed to initialise storage: {}", e))?;

    // --- Start background tasks ---

    // Reclaim expired holds on every known event
    let sweeper = CleanupService::new(app_state.backend.clone()).spawn(config.holds.sweep_interval());
    info!("Expiry sweeper running every {:?}", config.holds.sweep_interval());

    // --- Start the web server ---

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app(app_state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await;

    sweeper.abort();
    if let Err(e) = served {
        error!("Server error: {}", e);
        return Err(e.into());
    }
    Ok(())
}
