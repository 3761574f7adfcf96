use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::metrics::encode_metrics;
use crate::stats::{AdapterStats, ConnectionState, StatsSample};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub adapters: usize,
    pub streaming: usize,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub adapters: Vec<StatsSample>,
}

/// Shared state for health endpoints
#[derive(Clone)]
pub struct ServerState {
    pub adapters: Vec<Arc<AdapterStats>>,
}

impl ServerState {
    pub fn new(adapters: Vec<Arc<AdapterStats>>) -> Self {
        Self { adapters }
    }

    fn streaming(&self) -> usize {
        self.adapters
            .iter()
            .filter(|a| a.state() == ConnectionState::Streaming)
            .count()
    }
}

/// Health endpoint - always returns 200 if server is running
async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        adapters: state.adapters.len(),
        streaming: state.streaming(),
    })
}

/// Ready endpoint - returns 200 once any adapter is streaming
async fn ready(State(state): State<ServerState>) -> (StatusCode, Json<ReadyResponse>) {
    let ready = state.streaming() > 0;
    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadyResponse {
            status: if ready { "ready" } else { "not_ready" }.to_string(),
            adapters: state.adapters.iter().map(|a| a.sample()).collect(),
        }),
    )
}

/// Prometheus text exposition
async fn metrics() -> impl IntoResponse {
    match encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}

/// Create the health server router
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Run the health server
pub async fn run_server(addr: SocketAddr, state: ServerState) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
