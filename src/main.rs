// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc};

use fridge_telemetry::application::clock::SystemClock;
use fridge_telemetry::application::dashboard_service::DashboardService;
use fridge_telemetry::application::graph_service::GraphService;
use fridge_telemetry::application::prediction_service::PredictionService;
use fridge_telemetry::application::refresh::RefreshScheduler;
use fridge_telemetry::application::time_series_store::TimeSeriesStore;
use fridge_telemetry::infrastructure::config::load_telemetry_config;
use fridge_telemetry::infrastructure::postgrest_repository::PostgrestRepository;
use fridge_telemetry::presentation::app_state::AppState;
use fridge_telemetry::presentation::router::build_router;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_telemetry_config()?;

    // Create repository (infrastructure layer)
    let repository = Arc::new(PostgrestRepository::new(
        config.store.url.clone(),
        config.store.api_key.clone(),
    ));
    let clock = Arc::new(SystemClock);

    // Create services (application layer)
    let store = Arc::new(TimeSeriesStore::new(
        repository.clone(),
        clock.clone(),
        &config.store.sensor_table,
        config.cache.settings(),
    ));
    let dashboard_service = DashboardService::new(store.clone());
    let graph_service = GraphService::new(
        repository.clone(),
        clock.clone(),
        &config.store.sensor_table,
        config.chart.settings(),
    );
    let prediction_service =
        PredictionService::new(repository, clock, &config.store.prediction_table);

    let mut scheduler =
        RefreshScheduler::start(store.clone(), prediction_service.clone(), config.refresh.settings());
    if let Err(e) = scheduler.attach_listener(store).await {
        tracing::warn!("Realtime updates unavailable, relying on polling: {}", e);
    }

    // Create application state
    let state = Arc::new(AppState {
        dashboard_service,
        graph_service,
        prediction_service,
    });

    // Build router (presentation layer)
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server.bind.parse()?;
    tracing::info!("Starting fridge-telemetry service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    scheduler.shutdown();
    Ok(())
}
