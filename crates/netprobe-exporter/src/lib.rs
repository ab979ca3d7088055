// # Metrics Exporter
//
// HTTP surface of netprobe:
//
// - `GET /metrics`: Prometheus text exposition of the shared registry
// - `ANY /reboot-wireguard`: runs the installed `AdminHook`, if any
//
// The exporter only reads the registry; the engine is the sole writer.

use std::future::Future;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use netprobe_core::{AdminHook, NetworkMetrics};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Fixed listen address of the exporter
pub const LISTEN_ADDR: &str = "0.0.0.0:9091";

/// Scrape path
pub const METRICS_PATH: &str = "/metrics";

/// Administrative hook path
pub const ADMIN_PATH: &str = "/reboot-wireguard";

/// Shared handler state
#[derive(Clone)]
pub struct ExporterState {
    /// Registry rendered on every scrape
    pub metrics: Arc<NetworkMetrics>,

    /// Action behind the admin endpoint (None = no-op)
    pub admin: Option<Arc<dyn AdminHook>>,
}

impl ExporterState {
    /// State with no admin hook installed
    pub fn new(metrics: Arc<NetworkMetrics>) -> Self {
        Self {
            metrics,
            admin: None,
        }
    }

    /// Install an admin hook
    pub fn with_admin_hook(mut self, hook: Arc<dyn AdminHook>) -> Self {
        self.admin = Some(hook);
        self
    }
}

/// Build the exporter router
pub fn router(state: ExporterState) -> Router {
    Router::new()
        .route(METRICS_PATH, get(metrics_handler))
        .route(ADMIN_PATH, any(admin_handler))
        .with_state(state)
}

async fn metrics_handler(State(state): State<ExporterState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.metrics.content_type())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn admin_handler(State(state): State<ExporterState>) -> Response {
    let Some(hook) = state.admin else {
        debug!("Admin endpoint called with no hook installed");
        return StatusCode::OK.into_response();
    };

    match hook.trigger().await {
        Ok(()) => {
            info!(hook = hook.hook_name(), "Admin hook completed");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            error!(hook = hook.hook_name(), error = %e, "Admin hook failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("listening on [{}]", addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
