use pwa_packager::{app_state::AppState, config::AppConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting packaging worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");
    if config.redis_url.is_none() {
        tracing::warn!("REDIS_URL not set; this worker will only see jobs queued in its own process");
    }

    // Initialize services
    tracing::info!("Initializing services");
    let state = AppState::from_config(&config).expect("Failed to initialize services");
    let processor = state
        .processor(&config)
        .expect("Failed to initialize job processor");

    tracing::info!("Worker ready, waiting for job store");

    // Runs until the process is stopped.
    processor.run().await;
}
