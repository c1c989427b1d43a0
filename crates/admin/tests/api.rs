use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use hookgate_actions::{ActionResult, ActionRunner, Params};
use hookgate_admin::{build_router, new_shared_state};
use hookgate_common::{ActionDefinition, AppConfig, REDACTED};
use hookgate_rate_limit::RateLimitGate;
use hookgate_webhook::{SharedGateway, WebhookGateway};

const CONFIG: &str = r#"
server:
  listen: ["127.0.0.1:0"]
webhooks:
  deploy:
    action: notify
    signature_secret: top-secret
  open:
    action: notify
actions:
  notify:
    kind: exec
    cmd: "true"
"#;

struct Noop;

#[async_trait]
impl ActionRunner for Noop {
    async fn run(&self, _action: &ActionDefinition, _params: &Params) -> ActionResult<()> {
        Ok(())
    }
}

fn setup() -> (Router, SharedGateway) {
    let config = AppConfig::from_yaml(CONFIG).unwrap();
    let gateway = Arc::new(WebhookGateway::from_app_config(&config, Arc::new(Noop)));
    let gate = RateLimitGate::from_config(&config.rate_limit);
    let state = new_shared_state(config, gateway.clone(), gate);
    (build_router(state), gateway)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn put_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn trigger(gateway: &SharedGateway, name: &str) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhook/{}", name))
        .body(Body::empty())
        .unwrap();
    gateway.handle(Some(name), request).await.status()
}

#[tokio::test]
async fn health_reports_version() {
    let (app, _) = setup();
    let (status, body) = get_json(&app, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn config_is_redacted() {
    let (app, _) = setup();
    let (status, body) = get_json(&app, "/api/config").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["webhooks"]["deploy"]["signature_secret"], REDACTED);
    assert!(!body.to_string().contains("top-secret"));
}

#[tokio::test]
async fn config_round_trip_keeps_secrets_and_swaps_catalog() {
    let (app, gateway) = setup();
    let (_, mut config) = get_json(&app, "/api/config").await;

    config["webhooks"]
        .as_object_mut()
        .unwrap()
        .remove("open");

    let (status, body) = put_json(&app, "/api/config", &config).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "updated");

    let catalog = gateway.catalog();
    assert!(!catalog.webhooks.contains_key("open"));
    assert_eq!(
        catalog.webhooks["deploy"].signature_secret.as_deref(),
        Some("top-secret")
    );
    assert_eq!(trigger(&gateway, "open").await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let (app, gateway) = setup();
    let (_, mut config) = get_json(&app, "/api/config").await;
    config["webhooks"]["open"]["action"] = Value::from("missing-action");

    let (status, body) = put_json(&app, "/api/config", &config).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("validation failed"));
    assert!(gateway.catalog().webhooks.contains_key("open"));
}

#[tokio::test]
async fn logs_filter_and_stats() {
    let (app, gateway) = setup();

    assert_eq!(trigger(&gateway, "open").await, StatusCode::OK);
    assert_eq!(trigger(&gateway, "deploy").await, StatusCode::UNAUTHORIZED);
    assert_eq!(trigger(&gateway, "nope").await, StatusCode::NOT_FOUND);

    let (_, all) = get_json(&app, "/api/logs").await;
    assert_eq!(all["total"], 3);
    assert_eq!(all["entries"][0]["webhook"], "nope");

    let (_, failed) = get_json(&app, "/api/logs?success=false").await;
    assert_eq!(failed["total"], 2);

    let (_, deploy) = get_json(&app, "/api/logs?webhook=deploy&limit=1").await;
    assert_eq!(deploy["total"], 1);
    assert_eq!(deploy["entries"][0]["error"], "invalid or missing HMAC signature");

    let (_, stats) = get_json(&app, "/api/stats").await;
    assert_eq!(stats["webhooks"]["total_requests"], 3);
    assert_eq!(stats["webhooks"]["successful"], 1);
    assert_eq!(stats["webhooks"]["failed"], 2);
    assert_eq!(stats["slots"]["capacity"], 10);
    assert_eq!(stats["slots"]["free"], 10);
    assert_eq!(stats["clients"]["max_tracked"], 10_000);
    assert_eq!(stats["audit_entries"], 3);
}

#[tokio::test]
async fn metrics_exposition() {
    let (app, gateway) = setup();
    trigger(&gateway, "open").await;

    let request = Request::builder().uri("/api/metrics").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("hookgate_webhook_requests_total{status=\"200\"} 1"));
    assert!(text.contains("hookgate_action_duration_seconds"));
}

async fn preflight(app: &Router, origin: &str) -> axum::response::Response {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/config")
        .header("origin", origin)
        .header("access-control-request-method", "PUT")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

#[tokio::test]
async fn cross_origin_config_update_gets_no_cors_grant() {
    let (app, gateway) = setup();

    let response = preflight(&app, "https://evil.example").await;
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert!(response.headers().get("access-control-allow-methods").is_none());

    let (_, config) = get_json(&app, "/api/config").await;
    let request = Request::builder()
        .method("PUT")
        .uri("/api/config")
        .header("origin", "https://evil.example")
        .header("content-type", "application/json")
        .body(Body::from(config.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert_eq!(trigger(&gateway, "deploy").await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn configured_origin_is_allowed() {
    let mut config = AppConfig::from_yaml(CONFIG).unwrap();
    config.server.admin.cors_origins = vec!["https://ops.example".to_string()];
    let gateway = Arc::new(WebhookGateway::from_app_config(&config, Arc::new(Noop)));
    let gate = RateLimitGate::from_config(&config.rate_limit);
    let app = build_router(new_shared_state(config, gateway, gate));

    let allowed = preflight(&app, "https://ops.example").await;
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "https://ops.example"
    );

    let other = preflight(&app, "https://evil.example").await;
    assert!(other.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn redacted_secret_on_new_webhook_is_rejected() {
    let (app, gateway) = setup();
    let (_, mut config) = get_json(&app, "/api/config").await;
    config["webhooks"]["fresh"] = serde_json::json!({
        "action": "notify",
        "signature_secret": REDACTED,
    });

    let (status, body) = put_json(&app, "/api/config", &config).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("fresh"));
    assert!(!gateway.catalog().webhooks.contains_key("fresh"));
}

#[tokio::test]
async fn redacted_secret_without_current_value_is_rejected() {
    let (app, gateway) = setup();
    let (_, mut config) = get_json(&app, "/api/config").await;
    config["webhooks"]["open"]["secret"] = Value::from(REDACTED);

    let (status, _) = put_json(&app, "/api/config", &config).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(gateway.catalog().webhooks["open"].secret.is_none());
}
