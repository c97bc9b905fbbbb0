use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Clone)]
pub struct ServerState {
    pub host: String,
    pub connected: watch::Receiver<bool>,
    pub metrics: PrometheusHandle,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serves the router until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    state: ServerState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

async fn metrics_handler(State(state): State<ServerState>) -> String {
    state.metrics.render()
}

async fn health_handler(State(state): State<ServerState>) -> (StatusCode, Json<Value>) {
    let connected = *state.connected.borrow();
    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "host": state.host,
            "connected": connected,
        })),
    )
}
