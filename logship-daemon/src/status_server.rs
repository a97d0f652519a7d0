//! Status endpoint -- serves the monitor snapshot as JSON.
//!
//! One route, `GET {monitor.path}` (default `/monitor`); every other path
//! is a 404. No authentication.

use anyhow::Result;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use logship_core::config::MonitorConfig;
use logship_pipeline::MonitorHandle;

/// Builds the status router for `path`.
pub fn router(path: &str, monitor: MonitorHandle) -> Router {
    Router::new()
        .route(path, get(monitor_status))
        .with_state(monitor)
}

async fn monitor_status(State(monitor): State<MonitorHandle>) -> Response {
    let snapshot = match monitor.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(error = %e, "monitor snapshot unavailable");
            return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
        }
    };

    match snapshot.to_pretty_json() {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Binds the status listener. Failure is fatal to the daemon.
pub async fn bind(config: &MonitorConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.listen_addr, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind status endpoint {}: {}", addr, e))?;

    if let Ok(local) = listener.local_addr() {
        info!(listen_addr = %local, path = %config.path, "status endpoint listening");
    }
    Ok(listener)
}

/// Serves `router` on `listener` until `cancel` fires.
pub fn spawn(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| anyhow::anyhow!("status server failed: {}", e))
    })
}
