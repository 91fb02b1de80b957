use std::{sync::Arc, time::Duration};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{errors::InitializationError, stats::ProbeStats};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub probe_id: String,
    pub uptime: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_test: Option<OffsetDateTime>,
    pub tests_today: u64,
    pub reports_failed: u64,
    pub connect_failures: u64,
}

#[derive(Debug)]
pub struct HealthState {
    pub probe_id: String,
    pub stats: Arc<ProbeStats>,
}

type ApiState = Arc<HealthState>;

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.stats.snapshot();
    let uptime = Duration::from_secs(snapshot.uptime.as_secs());

    let response = HealthResponse {
        status: "healthy".to_string(),
        probe_id: state.probe_id.clone(),
        uptime: humantime::format_duration(uptime).to_string(),
        last_test: snapshot.last_test,
        tests_today: snapshot.tests_today,
        reports_failed: snapshot.reports_failed,
        connect_failures: snapshot.connect_failures,
    };

    (StatusCode::OK, Json(response))
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_http_server(
    address: String,
    port: u16,
    state: ApiState,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), InitializationError> {
    let addr = format!("{}:{}", address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| InitializationError::health_server(format!("bind {}: {}", addr, e)))?;

    info!("Health server listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
            info!("Health server shutting down");
        })
        .await
        .map_err(|e| InitializationError::health_server(e.to_string()))?;

    Ok(())
}
