use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::extract::{ConnectInfo, Path, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::Value;

use hookgate_actions::{ActionRunner, Params};
use hookgate_common::{ActionDefinition, AppConfig, GatewayConfig, WebhookDefinition};
use hookgate_rate_limit::GlobalLimiter;

use crate::audit::{sanitize_params, AuditEntry, AuditLog};
use crate::auth;
use crate::concurrency::ConcurrencyGate;
use crate::metrics::GatewayMetrics;
use crate::replay;
use crate::response::{GatewayError, WebhookResponse};

pub const SECRET_HEADER: &str = "x-webhook-secret";
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Webhook and action definitions served by the gateway.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub webhooks: BTreeMap<String, WebhookDefinition>,
    pub actions: BTreeMap<String, ActionDefinition>,
}

impl Catalog {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            webhooks: config.webhooks.clone(),
            actions: config.actions.clone(),
        }
    }
}

pub type SharedGateway = Arc<WebhookGateway>;

/// The `/webhook/{name}` pipeline: global rate limit, lookup, replay check,
/// authentication, body parsing, bounded execution and audit.
pub struct WebhookGateway {
    catalog: ArcSwap<Catalog>,
    limiter: GlobalLimiter,
    slots: ConcurrencyGate,
    runner: Arc<dyn ActionRunner>,
    audit: AuditLog,
    metrics: GatewayMetrics,
    max_body_bytes: usize,
}

impl WebhookGateway {
    pub fn new(config: &GatewayConfig, catalog: Catalog, runner: Arc<dyn ActionRunner>) -> Self {
        tracing::info!(
            webhooks = catalog.webhooks.len(),
            actions = catalog.actions.len(),
            max_concurrent_actions = config.max_concurrent_actions,
            "creating webhook gateway"
        );
        Self {
            catalog: ArcSwap::from_pointee(catalog),
            limiter: GlobalLimiter::new(config.rps, config.burst),
            slots: ConcurrencyGate::new(
                config.max_concurrent_actions,
                Duration::from_millis(config.slot_timeout_ms),
            ),
            runner,
            audit: AuditLog::new(config.audit_capacity),
            metrics: GatewayMetrics::new(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    pub fn from_app_config(config: &AppConfig, runner: Arc<dyn ActionRunner>) -> Self {
        Self::new(&config.gateway, Catalog::from_config(config), runner)
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.load_full()
    }

    /// Swap in new definitions. In-flight requests keep the catalog they
    /// started with.
    pub fn replace_catalog(&self, catalog: Catalog) {
        tracing::info!(
            webhooks = catalog.webhooks.len(),
            actions = catalog.actions.len(),
            "webhook catalog replaced"
        );
        self.catalog.store(Arc::new(catalog));
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn slots(&self) -> &ConcurrencyGate {
        &self.slots
    }

    /// Run one request through the pipeline and audit the outcome.
    pub async fn handle(&self, name: Option<&str>, request: Request) -> Response {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let user_agent = request
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut entry = AuditEntry::new(name.unwrap_or_default(), &remote_addr, &user_agent);
        let mut parsed = None;

        let outcome = self.process(name, request, &mut entry, &mut parsed).await;

        match outcome {
            Ok(()) => {
                self.metrics.record_status(StatusCode::OK.as_u16());
                self.audit.record(entry);
                let body = Json(WebhookResponse::ok("webhook triggered successfully"));
                (StatusCode::OK, body).into_response()
            }
            Err(err) => {
                if matches!(err, GatewayError::BadSignature | GatewayError::BadSecret) {
                    tracing::warn!(
                        webhook = %entry.webhook,
                        remote_addr = %remote_addr,
                        user_agent = %user_agent,
                        "webhook authentication failed"
                    );
                }
                self.metrics.record_status(err.status().as_u16());
                entry.success = false;
                entry.error = Some(err.to_string());
                entry.params = parsed.as_ref().map(sanitize_params);
                self.audit.record(entry);
                err.into_response()
            }
        }
    }

    async fn process(
        &self,
        name: Option<&str>,
        request: Request,
        entry: &mut AuditEntry,
        parsed: &mut Option<Params>,
    ) -> Result<(), GatewayError> {
        let name = name.filter(|n| !n.is_empty()).ok_or(GatewayError::NameRequired)?;

        if !self.limiter.allow() {
            return Err(GatewayError::RateLimited);
        }

        if request.method() != Method::POST {
            return Err(GatewayError::MethodNotAllowed);
        }

        let catalog = self.catalog.load_full();
        let webhook = catalog
            .webhooks
            .get(name)
            .ok_or_else(|| GatewayError::WebhookNotFound(name.to_string()))?;
        entry.action = Some(webhook.action.clone());

        let (parts, body) = request.into_parts();

        if webhook.validate_timestamp {
            replay::validate_timestamp(
                header(&parts.headers, TIMESTAMP_HEADER),
                webhook.timestamp_tolerance_secs(),
                chrono::Utc::now().timestamp(),
            )?;
        }

        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| GatewayError::BodyRead(e.to_string()))?;

        if let Some(key) = webhook.signature_secret() {
            if !auth::verify_signature(&key, &body, header(&parts.headers, SIGNATURE_HEADER)) {
                return Err(GatewayError::BadSignature);
            }
        } else if let Some(secret) = webhook.secret() {
            let provided = match header(&parts.headers, SECRET_HEADER).filter(|s| !s.is_empty()) {
                Some(value) => Some(value.to_string()),
                None => Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                    .ok()
                    .and_then(|Query(mut query)| query.remove("secret")),
            };
            if !auth::verify_secret(&secret, provided.as_deref()) {
                return Err(GatewayError::BadSecret);
            }
        }

        let params = parse_body(&body).map_err(GatewayError::BadBody)?;
        let params = &*parsed.insert(params);

        let action = catalog
            .actions
            .get(&webhook.action)
            .ok_or_else(|| GatewayError::ActionNotFound(webhook.action.clone()))?;

        let slot = self.slots.acquire().await.ok_or(GatewayError::Busy)?;
        self.metrics.slots_in_use.set(self.slots.in_use() as i64);

        let started = Instant::now();
        let result = self.runner.run(action, params).await;
        self.metrics
            .action_duration
            .with_label_values(&[action.kind.name()])
            .observe(started.elapsed().as_secs_f64());

        drop(slot);
        self.metrics.slots_in_use.set(self.slots.in_use() as i64);

        result.map_err(|e| GatewayError::Execution(e.to_string()))
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Decode request parameters.
///
/// An empty body means no parameters. `{"params": {...}}` yields the inner
/// object; any other JSON object is taken as the parameters themselves.
pub fn parse_body(body: &[u8]) -> Result<Params, String> {
    if body.is_empty() {
        return Ok(Params::new());
    }
    match serde_json::from_slice::<Value>(body).map_err(|e| e.to_string())? {
        Value::Object(map) => match map.get("params") {
            Some(Value::Object(params)) => Ok(params.clone()),
            _ => Ok(map),
        },
        _ => Err("expected a JSON object".to_string()),
    }
}

/// Routes served by the gateway: `/webhook/{name}` plus the bare `/webhook`
/// paths, which answer 400.
pub fn router(gateway: SharedGateway) -> Router {
    Router::new()
        .route("/webhook", any(missing_name))
        .route("/webhook/", any(missing_name))
        .route("/webhook/{name}", any(named))
        .with_state(gateway)
}

async fn named(
    State(gateway): State<SharedGateway>,
    Path(name): Path<String>,
    request: Request,
) -> Response {
    gateway.handle(Some(&name), request).await
}

async fn missing_name(State(gateway): State<SharedGateway>, request: Request) -> Response {
    gateway.handle(None, request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_wrapped_and_bare() {
        let wrapped = parse_body(br#"{"params": {"message": "ok"}}"#).unwrap();
        assert_eq!(wrapped["message"], "ok");
        assert!(!wrapped.contains_key("params"));

        let bare = parse_body(br#"{"message": "ok"}"#).unwrap();
        assert_eq!(bare["message"], "ok");

        let null_params = parse_body(br#"{"params": null, "x": 1}"#).unwrap();
        assert_eq!(null_params["x"], 1);
    }

    #[test]
    fn parse_empty_and_invalid() {
        assert!(parse_body(b"").unwrap().is_empty());
        assert!(parse_body(b"{not json").is_err());
        assert!(parse_body(b"[1,2]").is_err());
        assert_eq!(parse_body(b"{}").unwrap(), Params::new());
    }
}
