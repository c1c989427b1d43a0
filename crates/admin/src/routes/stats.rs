use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /api/stats
///
/// Returns webhook outcome counters, per-client limiter occupancy and
/// concurrency slot usage.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = state.start_time.elapsed().as_secs();

    let counts = state.gateway.metrics().status_counts();
    let total_requests: u64 = counts.values().sum();
    let successful = counts.get(&200).copied().unwrap_or(0);
    let rate_limited = counts.get(&429).copied().unwrap_or(0);
    let busy = counts.get(&503).copied().unwrap_or(0);

    let requests_per_second = if uptime_secs > 0 {
        total_requests as f64 / uptime_secs as f64
    } else {
        0.0
    };

    let clients = state.rate_limit.registry().stats();
    let slots = state.gateway.slots();

    Json(json!({
        "webhooks": {
            "total_requests": total_requests,
            "successful": successful,
            "failed": total_requests - successful,
            "rate_limited": rate_limited,
            "busy": busy,
            "by_status": counts,
        },
        "clients": {
            "enabled": state.rate_limit.is_enabled(),
            "tracked": clients.tracked,
            "max_tracked": clients.max_tracked,
            "evicted_total": clients.evicted_total,
            "denied_total": clients.denied_total,
        },
        "slots": {
            "capacity": slots.capacity(),
            "free": slots.available(),
        },
        "audit_entries": state.gateway.audit().len(),
        "uptime_secs": uptime_secs,
        "requests_per_second": requests_per_second
    }))
}
