use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use elasticsearch_snapshot_collector::{CollectorConfig, SnapshotCollector};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub struct AppState {
    pub registry: Registry,
}

pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Scraping the cluster blocks, keep it off the async workers.
    let encoded = tokio::task::spawn_blocking(move || {
        let mut buffer = String::new();
        encode(&mut buffer, &state.registry).map(|()| buffer)
    })
    .await;

    match encoded {
        Ok(Ok(buffer)) => Response::builder()
            .status(StatusCode::OK)
            .header(
                CONTENT_TYPE,
                "application/openmetrics-text; version=1.0.0; charset=utf-8",
            )
            .body(Body::from(buffer))
            .unwrap(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "snapshot-collector.toml".to_string());
    let config = CollectorConfig::load(path)?;

    // The blocking HTTP client must be created outside of the async runtime.
    let collector = SnapshotCollector::from_config(&config)?;
    let mut registry = Registry::default();
    registry.register_collector(Box::new(collector));
    let state = Arc::new(AppState { registry });

    tokio::runtime::Runtime::new()?.block_on(async move {
        let router = Router::new()
            .route("/metrics", get(metrics_handler))
            .with_state(state);
        let port = 9114;
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
        tracing::info!(port, url = %config.url, "serving snapshot metrics");

        axum::serve(listener, router).await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
