//! REST API and WebSocket server for the health hub
//!
//! ## Endpoints
//!
//! - `GET  /api/v1/health` - Health check
//! - `GET  /api/v1/servers` - Snapshot of every monitored server
//! - `GET  /api/v1/servers/:name` - Snapshot of one server
//! - `POST /api/v1/metrics/:name` - Agent metric push (`{"cpu", "memoryLoad"}`)
//! - `GET  /api/v1/alerts/config` - Alert thresholds and recipient
//! - `PUT  /api/v1/alerts/config` - Update thresholds and recipient
//! - `WS   /api/v1/stream` - Periodic registry snapshots

pub mod error;
pub mod routes;
pub mod state;
pub mod types;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{AlertConfigResponse, HealthResponse};

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiSettings;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:3000")
    pub bind_addr: SocketAddr,

    /// Enable CORS for dashboards served from elsewhere
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ApiSettings::default())
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            bind_addr: settings.bind,
            enable_cors: true,
        }
    }
}

pub fn build_router(state: ApiState, enable_cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/servers", get(routes::servers::list_servers))
        .route("/api/v1/servers/:name", get(routes::servers::get_server))
        .route("/api/v1/metrics/:name", post(routes::metrics::push_metrics))
        .route(
            "/api/v1/alerts/config",
            get(routes::alerts::get_alert_config).put(routes::alerts::update_alert_config),
        )
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task and returns the bound address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = build_router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
