use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use hookgate_common::{AppConfig, REDACTED};
use hookgate_webhook::Catalog;

use crate::state::SharedState;

/// GET /api/config
///
/// Returns the running configuration as JSON with every webhook secret
/// replaced by `[REDACTED]`.
pub async fn get_config(State(state): State<SharedState>) -> impl IntoResponse {
    let redacted = state.config().redacted();
    Json(serde_json::to_value(&redacted).unwrap_or(json!({"error": "serialization failed"})))
}

/// PUT /api/config
///
/// Accepts a full configuration, validates it and swaps in the new webhook
/// and action definitions. Secrets sent back as `[REDACTED]` keep their
/// current value; a `[REDACTED]` placeholder with no current secret behind it
/// is rejected. Listener, rate-limit and executor settings are stored but
/// only take effect on restart.
pub async fn update_config(
    State(state): State<SharedState>,
    Json(mut new_config): Json<AppConfig>,
) -> impl IntoResponse {
    let restored = {
        let current = state.config();
        restore_redacted_secrets(&mut new_config, &current)
    };
    if let Err(e) = restored {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": e
            })),
        );
    }

    if let Err(e) = new_config.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "status": "error",
                "message": format!("validation failed: {}", e)
            })),
        );
    }

    state.gateway.replace_catalog(Catalog::from_config(&new_config));
    *state.config_mut() = new_config;

    tracing::info!("configuration updated via admin API");

    (
        StatusCode::OK,
        Json(json!({
            "status": "updated"
        })),
    )
}

fn restore_redacted_secrets(incoming: &mut AppConfig, current: &AppConfig) -> Result<(), String> {
    for (name, webhook) in incoming.webhooks.iter_mut() {
        let existing = current.webhooks.get(name);
        if webhook.secret.as_deref() == Some(REDACTED) {
            webhook.secret = Some(
                existing
                    .and_then(|w| w.secret.clone())
                    .ok_or_else(|| no_secret_to_restore(name, "secret"))?,
            );
        }
        if webhook.signature_secret.as_deref() == Some(REDACTED) {
            webhook.signature_secret = Some(
                existing
                    .and_then(|w| w.signature_secret.clone())
                    .ok_or_else(|| no_secret_to_restore(name, "signature_secret"))?,
            );
        }
    }
    Ok(())
}

fn no_secret_to_restore(webhook: &str, field: &str) -> String {
    format!("webhook '{webhook}': {field} is {REDACTED} but there is no current value to keep")
}
