//! Shared configuration, error types and address classification for the
//! hookgate workspace.

pub mod config;
pub mod error;
pub mod net;

pub use config::{
    ActionDefinition, ActionKind, AdminConfig, AppConfig, ExecutorConfig, GatewayConfig,
    ParamDef, ParamType, RateLimitConfig, ServerConfig, WebhookDefinition, REDACTED,
};
pub use error::{HookgateError, HookgateResult};
