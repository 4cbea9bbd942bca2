use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use pwa_packager::{app_state::AppState, config::AppConfig, routes};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
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

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing pwa-packager server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!(
        "package_jobs_started_total",
        "Packaging attempts started"
    );
    metrics::describe_counter!(
        "package_jobs_completed_total",
        "Packaging jobs completed with an uploaded artifact"
    );
    metrics::describe_counter!(
        "package_jobs_retried_total",
        "Failed packaging attempts that were requeued"
    );
    metrics::describe_counter!(
        "package_jobs_failed_total",
        "Packaging jobs that exhausted their retries"
    );
    metrics::describe_histogram!(
        "package_build_seconds",
        "Time spent in the package build command"
    );
    metrics::describe_gauge!(
        "package_queue_depth",
        "Pending packaging jobs, sampled by the health check"
    );

    let state = AppState::from_config(&config).expect("Failed to initialize services");

    // The processor shares the in-process store and queue, so without Redis it
    // must run here to see any jobs.
    if config.run_worker {
        let processor = state
            .processor(&config)
            .expect("Failed to initialize job processor");
        let _processor = processor.start();
        tracing::info!("Packaging job processor started in-process");
    }

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/packages", post(routes::packages::enqueue_package))
        .route(
            "/api/v1/packages/{job_id}",
            get(routes::packages::get_package_job),
        )
        .route(
            "/api/v1/packages/{job_id}/download",
            get(routes::packages::download_package),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit, signing keys included

    tracing::info!("Starting pwa-packager on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
