use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::client_ip::{client_identity, UNKNOWN_CLIENT};
use crate::RateLimitGate;

/// Build the response sent to a rate-limited caller.
pub fn too_many_requests() -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({ "error": "rate limit exceeded" })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

/// Per-client rate limiting for an axum router.
///
/// Install with `axum::middleware::from_fn_with_state(gate, rate_limit)`. The
/// peer address comes from `ConnectInfo<SocketAddr>`; without it every
/// request shares the `unknown` identity.
pub async fn rate_limit(
    State(gate): State<RateLimitGate>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    let identity = client_identity(&peer, request.headers());

    if !gate.allow(&identity) {
        tracing::debug!(client = %identity, "rate limited");
        return too_many_requests();
    }

    next.run(request).await
}
