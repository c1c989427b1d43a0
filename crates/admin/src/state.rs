use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hookgate_common::AppConfig;
use hookgate_rate_limit::RateLimitGate;
use hookgate_webhook::SharedGateway;

/// Shared state type alias used across all route handlers.
pub type SharedState = Arc<AppState>;

/// Handles to the running gatekeeper that the admin API inspects and
/// reconfigures.
pub struct AppState {
    pub config: RwLock<AppConfig>,
    pub gateway: SharedGateway,
    pub rate_limit: RateLimitGate,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: AppConfig, gateway: SharedGateway, rate_limit: RateLimitGate) -> Self {
        Self {
            config: RwLock::new(config),
            gateway,
            rate_limit,
            start_time: std::time::Instant::now(),
        }
    }

    pub fn config(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config_mut(&self) -> RwLockWriteGuard<'_, AppConfig> {
        self.config.write().unwrap_or_else(PoisonError::into_inner)
    }
}
