use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::SharedState;

/// Query parameters for the audit log endpoint.
#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Maximum number of entries to return (default: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of entries to skip (default: 0).
    #[serde(default)]
    pub offset: usize,
    /// Optional filter by webhook name.
    pub webhook: Option<String>,
    /// Optional filter by outcome.
    pub success: Option<bool>,
}

fn default_limit() -> usize {
    100
}

/// GET /api/logs
///
/// Returns a paginated, optionally filtered list of webhook audit entries,
/// newest first.
pub async fn get_logs(
    State(state): State<SharedState>,
    Query(params): Query<LogQuery>,
) -> Json<Value> {
    let entries = state.gateway.audit().recent();

    let filtered: Vec<_> = entries
        .into_iter()
        .filter(|entry| {
            if let Some(ref webhook) = params.webhook {
                if &entry.webhook != webhook {
                    return false;
                }
            }
            params.success.map_or(true, |success| entry.success == success)
        })
        .collect();

    let total = filtered.len();

    let page: Vec<_> = filtered
        .into_iter()
        .skip(params.offset)
        .take(params.limit)
        .collect();

    Json(json!({
        "total": total,
        "offset": params.offset,
        "limit": params.limit,
        "entries": page
    }))
}
