//! Per-client rate limiting for hookgate.
//!
//! Every client identity (see [`client_identity`]) gets its own token bucket
//! in a bounded [`TokenBucketRegistry`]. The registry keeps identities in
//! least-recently-used order: when it is full, the idle-longest client is
//! evicted to make room and the newcomer starts with a full bucket.
//!
//! [`RateLimitGate`] is the facade used by the server. It wraps the registry
//! in an `Arc`, plugs into axum through [`middleware::rate_limit`], and runs
//! the periodic idle sweep as a cancellable tokio task.

pub mod client_ip;
pub mod lru;
pub mod middleware;
pub mod registry;
pub mod token_bucket;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use hookgate_common::RateLimitConfig;

pub use client_ip::client_identity;
pub use registry::{RegistryStats, TokenBucketRegistry};
pub use token_bucket::{GlobalLimiter, TokenBucket};

/// Shared per-client limiter. Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct RateLimitGate {
    registry: Arc<TokenBucketRegistry>,
    enabled: bool,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl RateLimitGate {
    /// * `rps`         - sustained requests per second per client
    /// * `burst`       - bucket capacity per client
    /// * `max_tracked` - clients tracked at once (0 = default)
    pub fn new(rps: f64, burst: u32, max_tracked: usize) -> Self {
        tracing::info!(rps, burst, max_tracked, "creating per-client rate limiter");
        Self {
            registry: Arc::new(TokenBucketRegistry::new(rps, burst, max_tracked)),
            enabled: true,
            idle_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(300),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        let mut gate = Self::new(config.rps, config.burst, config.effective_max_tracked());
        gate.enabled = config.enabled;
        gate.idle_timeout = Duration::from_secs(config.idle_timeout_secs.max(1));
        gate.sweep_interval = Duration::from_secs(config.sweep_interval_secs.max(1));
        gate
    }

    pub fn with_sweep(mut self, idle_timeout: Duration, sweep_interval: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self.sweep_interval = sweep_interval;
        self
    }

    /// Returns `true` if the request is permitted, `false` if the caller
    /// should receive a 429 response. Always `true` when disabled.
    pub fn allow(&self, identity: &str) -> bool {
        !self.enabled || self.registry.allow(identity)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn registry(&self) -> &Arc<TokenBucketRegistry> {
        &self.registry
    }

    /// Spawn the idle sweep. The task runs every `sweep_interval` (first run
    /// one interval from now) until `cancel` fires.
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> SweepHandle {
        let registry = Arc::clone(&self.registry);
        let idle_timeout = self.idle_timeout;
        let period = self.sweep_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.sweep(idle_timeout);
                        tracing::trace!(removed, "rate limiter sweep tick completed");
                    }
                }
            }
            tracing::debug!("rate limiter sweep stopped");
        });

        SweepHandle { task }
    }
}

/// Completion handle of the sweep task.
#[derive(Debug)]
pub struct SweepHandle {
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Resolves once the sweep task has exited.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "rate limiter sweep task failed");
        }
    }
}
