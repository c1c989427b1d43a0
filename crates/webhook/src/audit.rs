use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hookgate_actions::Params;
use hookgate_common::REDACTED;

/// Substrings marking a parameter name as sensitive (matched case-insensitively).
const SENSITIVE_KEYS: [&str; 6] = ["password", "secret", "token", "key", "auth", "credential"];

/// One webhook invocation as seen by the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub webhook: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub remote_addr: String,
    pub user_agent: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present on failures only, after redaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
}

impl AuditEntry {
    pub fn new(webhook: &str, remote_addr: &str, user_agent: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            webhook: webhook.to_string(),
            action: None,
            remote_addr: remote_addr.to_string(),
            user_agent: user_agent.to_string(),
            success: true,
            error: None,
            params: None,
        }
    }
}

/// Replace the value of every sensitive-looking key with [`REDACTED`].
/// Only top-level keys are inspected.
pub fn sanitize_params(params: &Params) -> Params {
    params
        .iter()
        .map(|(key, value)| {
            let lower = key.to_ascii_lowercase();
            if SENSITIVE_KEYS.iter().any(|s| lower.contains(s)) {
                (key.clone(), Value::String(REDACTED.to_string()))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

/// Bounded in-memory audit trail. Every entry is also written to the
/// `hookgate::audit` tracing target.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let action = entry.action.as_deref().unwrap_or("-");
        if entry.success {
            tracing::info!(
                target: "hookgate::audit",
                id = %entry.id,
                webhook = %entry.webhook,
                action,
                remote_addr = %entry.remote_addr,
                user_agent = %entry.user_agent,
                success = true,
                "webhook invoked"
            );
        } else {
            let params = entry
                .params
                .as_ref()
                .and_then(|p| serde_json::to_string(p).ok())
                .unwrap_or_default();
            tracing::warn!(
                target: "hookgate::audit",
                id = %entry.id,
                webhook = %entry.webhook,
                action,
                remote_addr = %entry.remote_addr,
                user_agent = %entry.user_agent,
                success = false,
                error = entry.error.as_deref().unwrap_or_default(),
                params = %params,
                "webhook failed"
            );
        }

        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Entries newest first.
    pub fn recent(&self) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().rev().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
