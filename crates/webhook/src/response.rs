use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::replay::ReplayError;

/// JSON envelope returned by `/webhook/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

/// Every way a webhook request can be turned away.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("webhook name required")]
    NameRequired,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("only POST method is allowed")]
    MethodNotAllowed,

    #[error("webhook not found: {0}")]
    WebhookNotFound(String),

    #[error("timestamp validation failed: {0}")]
    Timestamp(#[from] ReplayError),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("invalid or missing HMAC signature")]
    BadSignature,

    #[error("invalid or missing secret")]
    BadSecret,

    #[error("invalid request body: {0}")]
    BadBody(String),

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("server too busy, try again later")]
    Busy,

    #[error("action execution failed: {0}")]
    Execution(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NameRequired | GatewayError::BodyRead(_) | GatewayError::BadBody(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::WebhookNotFound(_) | GatewayError::ActionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            GatewayError::Timestamp(_) | GatewayError::BadSignature | GatewayError::BadSecret => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(WebhookResponse::failed(self.to_string()));
        let mut response = (status, body).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(GatewayError::NameRequired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(GatewayError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(GatewayError::WebhookNotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::Timestamp(ReplayError::Missing).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(GatewayError::Busy.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            GatewayError::Timestamp(ReplayError::Invalid).to_string(),
            "timestamp validation failed: invalid timestamp format"
        );
    }

    #[test]
    fn envelope_shape() {
        let ok = serde_json::to_value(WebhookResponse::ok("done")).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "message": "done"}));

        let failed = serde_json::to_value(WebhookResponse::failed("nope")).unwrap();
        assert_eq!(failed, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn rate_limited_has_retry_after() {
        let response = GatewayError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "1");
    }
}
