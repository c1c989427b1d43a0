pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};

use hookgate_common::AppConfig;
use hookgate_rate_limit::RateLimitGate;
use hookgate_webhook::SharedGateway;

use crate::state::SharedState;

pub use state::AppState;

/// Build the Axum router with all admin API routes and middleware.
///
/// CORS headers are only sent to the origins listed in
/// `server.admin.cors_origins`; with the default empty list browsers refuse
/// every cross-origin call.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config().server.admin.cors_origins);

    let router = Router::new()
        // Health check
        .route("/api/health", get(routes::health::health_check))
        // Prometheus metrics
        .route("/api/metrics", get(routes::metrics::get_metrics))
        // Configuration management
        .route(
            "/api/config",
            get(routes::config::get_config).put(routes::config::update_config),
        )
        // Audit logs
        .route("/api/logs", get(routes::logs::get_logs))
        // Traffic statistics
        .route("/api/stats", get(routes::stats::get_stats))
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid admin CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::PUT])
            .allow_headers([header::CONTENT_TYPE]),
    )
}

/// Serve the admin API on `listen_addr` until `shutdown` fires.
pub async fn run_admin_server(
    state: SharedState,
    listen_addr: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!("admin API server listening on {}", listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// Convenience function to create a SharedState from the running components.
pub fn new_shared_state(
    config: AppConfig,
    gateway: SharedGateway,
    rate_limit: RateLimitGate,
) -> SharedState {
    Arc::new(AppState::new(config, gateway, rate_limit))
}
