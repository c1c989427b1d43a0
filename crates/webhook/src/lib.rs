//! Webhook ingestion for hookgate.
//!
//! `POST /webhook/{name}` runs through a fixed pipeline:
//!
//! 1. global token bucket (all callers share one budget),
//! 2. webhook lookup,
//! 3. optional replay check on `X-Webhook-Timestamp`,
//! 4. bounded body read,
//! 5. HMAC signature or shared-secret check, both constant time,
//! 6. parameter decoding and action lookup,
//! 7. a concurrency slot with bounded wait,
//! 8. action execution through an [`ActionRunner`](hookgate_actions::ActionRunner).
//!
//! Every outcome, success or failure, produces one [`AuditEntry`].

pub mod audit;
pub mod auth;
pub mod concurrency;
pub mod gateway;
pub mod metrics;
pub mod replay;
pub mod response;

pub use audit::{sanitize_params, AuditEntry, AuditLog};
pub use concurrency::{ConcurrencyGate, SlotGuard};
pub use gateway::{parse_body, router, Catalog, SharedGateway, WebhookGateway};
pub use metrics::GatewayMetrics;
pub use replay::ReplayError;
pub use response::{GatewayError, WebhookResponse};
