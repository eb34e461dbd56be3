use super::{build_store, load_config};
use crate::source;
use anyhow::Result;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use firehose_metrics::exporters::{PrometheusExporter, TEXT_CONTENT_TYPE};
use firehose_metrics::MetricStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    start_time: Instant,
    store: Arc<MetricStore>,
    exporter: Arc<PrometheusExporter>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    total_envelopes_received: i64,
    slow_consumer_alert: bool,
}

pub async fn execute(
    config_file: Option<PathBuf>,
    envelope_file: Option<PathBuf>,
    listen_address: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_file).await?;
    if let Some(address) = listen_address {
        info!("Overriding listen address: {}", address);
        config.web.listen_address = address;
    }
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    let addr = config.listen_address().map_err(|e| anyhow::anyhow!(e))?;

    let store = Arc::new(build_store(&config)?);
    let _sweepers = store.spawn_sweepers();

    let exporter = Arc::new(
        PrometheusExporter::new(config.namespace.as_str(), store.clone())?
            .flush_after_scrape(config.metrics.flush_after_scrape),
    );

    let (sender, receiver) = mpsc::channel(config.ingest.buffer_size);
    tokio::spawn(source::ingest(receiver, store.clone()));

    let reader = source::open(envelope_file.as_deref()).await?;
    let pump_store = store.clone();
    tokio::spawn(async move {
        if let Err(e) = source::pump(reader, sender, pump_store).await {
            error!("Envelope source failed: {}", e);
        }
    });

    let state = AppState {
        start_time: Instant::now(),
        store,
        exporter,
    };

    let app = Router::new()
        .route(&config.web.telemetry_path, get(scrape))
        .route("/health", get(health_check))
        .with_state(state);

    info!("Starting firehose exporter on {}", addr);
    info!("Endpoints:");
    info!("  GET  {:<16} - Prometheus scrape", config.web.telemetry_path);
    info!("  GET  {:<16} - Health check", "/health");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Firehose exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

async fn scrape(State(state): State<AppState>) -> impl IntoResponse {
    match state.exporter.render().await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
            body,
        ),
        Err(e) => {
            error!("Failed to render scrape: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let metrics = state.store.get_internal_metrics();
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        total_envelopes_received: metrics.total_envelopes_received,
        slow_consumer_alert: metrics.slow_consumer_alert,
    })
}
