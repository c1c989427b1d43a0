use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use hookgate_actions::SourceRegistry;
use hookgate_server::{Gatekeeper, ServerArgs, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let args = ServerArgs::parse(std::env::args().skip(1))?;
    info!(
        config_path = %args.config_path.display(),
        allow_exec = args.allow_exec,
        "starting hookgate"
    );

    let server_config = ServerConfig::load(&args)?;
    let config = server_config.config;
    if config.executor.allow_exec {
        warn!("exec actions are enabled");
    }

    // SQL sources are registered by embedders; the standalone binary has none.
    let gatekeeper = Gatekeeper::build(config, SourceRegistry::new())?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        signal.cancel();
    });

    hookgate_server::run(gatekeeper, shutdown).await
}
