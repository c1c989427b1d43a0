use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use hookgate_actions::{ActionExecutor, ExecutorOptions, SourceRegistry};
use hookgate_admin::state::SharedState;
use hookgate_common::AppConfig;
use hookgate_rate_limit::middleware::rate_limit;
use hookgate_rate_limit::RateLimitGate;
use hookgate_webhook::{SharedGateway, WebhookGateway};

/// The assembled gatekeeper: per-client limiter in front of the webhook
/// gateway, which runs actions through the executor.
pub struct Gatekeeper {
    pub config: AppConfig,
    pub gateway: SharedGateway,
    pub rate_limit: RateLimitGate,
}

impl Gatekeeper {
    pub fn build(config: AppConfig, sources: SourceRegistry) -> Result<Self> {
        let executor = ActionExecutor::new(ExecutorOptions::from(&config.executor), sources)?;
        let gateway = Arc::new(WebhookGateway::from_app_config(&config, Arc::new(executor)));
        let rate_limit = RateLimitGate::from_config(&config.rate_limit);

        Ok(Self {
            config,
            gateway,
            rate_limit,
        })
    }

    /// Public router: webhook routes behind the per-client rate limit.
    pub fn public_router(&self) -> Router {
        hookgate_webhook::router(self.gateway.clone())
            .layer(axum::middleware::from_fn_with_state(self.rate_limit.clone(), rate_limit))
            .layer(TraceLayer::new_for_http())
    }

    pub fn admin_state(&self) -> SharedState {
        hookgate_admin::new_shared_state(
            self.config.clone(),
            self.gateway.clone(),
            self.rate_limit.clone(),
        )
    }
}

/// Serve until `shutdown` fires, then drain listeners and stop the sweep.
///
/// Every public listener is bound before any task is spawned, so a bind
/// failure returns without leaving work behind.
pub async fn run(gatekeeper: Gatekeeper, shutdown: CancellationToken) -> Result<()> {
    let mut listeners = Vec::with_capacity(gatekeeper.config.server.listen.len());
    for listen_addr in &gatekeeper.config.server.listen {
        let listener = tokio::net::TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("failed to bind webhook listener on {listen_addr}"))?;
        info!(addr = %listen_addr, "webhook listener started");
        listeners.push(listener);
    }

    let sweeper = gatekeeper.rate_limit.spawn_sweeper(shutdown.clone());
    let mut tasks = JoinSet::new();

    let router = gatekeeper.public_router();
    for listener in listeners {
        let app = router.clone().into_make_service_with_connect_info::<SocketAddr>();
        let token = shutdown.clone();
        tasks.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .map_err(anyhow::Error::from)
        });
    }

    let admin = &gatekeeper.config.server.admin;
    if admin.enabled {
        let state = gatekeeper.admin_state();
        let listen_addr = admin.listen.clone();
        let token = shutdown.clone();
        tasks.spawn(
            async move { hookgate_admin::run_admin_server(state, &listen_addr, token).await },
        );
    }

    info!("hookgate started successfully");

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "server task failed");
                shutdown.cancel();
            }
            Err(e) => {
                error!(error = %e, "server task panicked");
                shutdown.cancel();
            }
        }
    }

    sweeper.wait().await;
    info!("hookgate stopped");
    Ok(())
}
