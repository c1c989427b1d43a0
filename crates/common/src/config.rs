use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{HookgateError, HookgateResult};

/// Marker written in place of secret values whenever configuration or
/// parameters leave the process (admin API, audit log).
pub const REDACTED: &str = "[REDACTED]";

/// Top-level gatekeeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub webhooks: BTreeMap<String, WebhookDefinition>,
    #[serde(default)]
    pub actions: BTreeMap<String, ActionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: Vec<String>,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_listen")]
    pub listen: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Browser origins allowed to call the admin API. Empty means no CORS
    /// headers are sent and cross-origin calls are refused by browsers.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            listen: default_admin_listen(),
            enabled: true,
            cors_origins: Vec::new(),
        }
    }
}

/// Per-client-IP rate limiting applied in front of the webhook routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_client_rps")]
    pub rps: f64,
    #[serde(default = "default_client_burst")]
    pub burst: u32,
    /// Maximum number of client identities tracked at once. Zero means the
    /// default (10 000).
    #[serde(default = "default_max_tracked")]
    pub max_tracked: usize,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: default_client_rps(),
            burst: default_client_burst(),
            max_tracked: default_max_tracked(),
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl RateLimitConfig {
    pub fn effective_max_tracked(&self) -> usize {
        if self.max_tracked == 0 {
            default_max_tracked()
        } else {
            self.max_tracked
        }
    }
}

/// Settings of the `/webhook/{name}` pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Global (all callers) webhook rate, requests per second.
    #[serde(default = "default_gateway_rps")]
    pub rps: f64,
    #[serde(default = "default_gateway_burst")]
    pub burst: u32,
    #[serde(default = "default_max_concurrent_actions")]
    pub max_concurrent_actions: usize,
    #[serde(default = "default_slot_timeout_ms")]
    pub slot_timeout_ms: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Number of audit entries retained in memory for the admin API.
    #[serde(default = "default_audit_capacity")]
    pub audit_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rps: default_gateway_rps(),
            burst: default_gateway_burst(),
            max_concurrent_actions: default_max_concurrent_actions(),
            slot_timeout_ms: default_slot_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
            audit_capacity: default_audit_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Exec actions are refused unless this is set (or `--allow-exec` is
    /// passed on the command line).
    #[serde(default)]
    pub allow_exec: bool,
    /// Lets HTTP actions reach loopback, private and link-local targets.
    #[serde(default)]
    pub allow_private_targets: bool,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_action_timeout")]
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            allow_exec: false,
            allow_private_targets: false,
            working_dir: default_working_dir(),
            timeout_secs: default_action_timeout(),
        }
    }
}

/// A named inbound trigger bound to exactly one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookDefinition {
    pub action: String,
    /// Plain shared secret, checked against `X-Webhook-Secret` or `?secret=`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// HMAC-SHA256 key for `X-Webhook-Signature`. Takes precedence over
    /// `secret` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_secret: Option<String>,
    #[serde(default)]
    pub validate_timestamp: bool,
    /// Maximum age in seconds of `X-Webhook-Timestamp`. Zero means 300.
    #[serde(default)]
    pub timestamp_tolerance: i64,
}

impl WebhookDefinition {
    /// The plain secret with environment variables expanded, if non-empty.
    pub fn secret(&self) -> Option<String> {
        expand_non_empty(self.secret.as_deref())
    }

    /// The HMAC key with environment variables expanded, if non-empty.
    pub fn signature_secret(&self) -> Option<String> {
        expand_non_empty(self.signature_secret.as_deref())
    }

    pub fn timestamp_tolerance_secs(&self) -> u64 {
        if self.timestamp_tolerance <= 0 {
            300
        } else {
            self.timestamp_tolerance as u64
        }
    }

    pub fn validate(
        &self,
        name: &str,
        actions: &BTreeMap<String, ActionDefinition>,
    ) -> HookgateResult<()> {
        if self.action.trim().is_empty() {
            return Err(HookgateError::Config(format!("webhook '{}': action is required", name)));
        }
        if !actions.contains_key(&self.action) {
            return Err(HookgateError::Config(format!(
                "webhook '{}' references unknown action '{}'",
                name, self.action
            )));
        }
        if self.validate_timestamp && self.timestamp_tolerance < 0 {
            return Err(HookgateError::Config(format!(
                "webhook '{}': timestamp_tolerance cannot be negative",
                name
            )));
        }
        Ok(())
    }
}

/// A side-effecting operation a webhook can trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(default)]
    pub params: BTreeMap<String, ParamDef>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionKind {
    /// Parameterized statement run against a named source.
    Sql { source: String, statement: String },
    /// Outbound HTTP request; `url`, `body` and header values are templates.
    Http {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        body: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        headers: BTreeMap<String, String>,
    },
    /// Shell command run with `sh -c`; `cmd` is a template.
    Exec { cmd: String },
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Sql { .. } => "sql",
            ActionKind::Http { .. } => "http",
            ActionKind::Exec { .. } => "exec",
        }
    }
}

impl ActionDefinition {
    pub fn validate(&self, name: &str) -> HookgateResult<()> {
        let missing = match &self.kind {
            ActionKind::Sql { source, .. } if source.trim().is_empty() => Some("source"),
            ActionKind::Sql { statement, .. } if statement.trim().is_empty() => Some("statement"),
            ActionKind::Http { url, .. } if url.trim().is_empty() => Some("url"),
            ActionKind::Exec { cmd } if cmd.trim().is_empty() => Some("cmd"),
            _ => None,
        };
        match missing {
            Some(field) => Err(HookgateError::Config(format!(
                "action '{}' ({}): {} is required",
                name,
                self.kind.name(),
                field
            ))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamDef {
    #[serde(default, rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub required: bool,
    /// Value used when an optional parameter is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Bool,
    Date,
}

// Default value helpers
fn default_admin_listen() -> String {
    "127.0.0.1:9090".to_string()
}
fn default_true() -> bool {
    true
}
fn default_client_rps() -> f64 {
    10.0
}
fn default_client_burst() -> u32 {
    20
}
fn default_max_tracked() -> usize {
    10_000
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_gateway_rps() -> f64 {
    10.0
}
fn default_gateway_burst() -> u32 {
    20
}
fn default_max_concurrent_actions() -> usize {
    10
}
fn default_slot_timeout_ms() -> u64 {
    5_000
}
fn default_max_body_bytes() -> usize {
    1 << 20 // 1 MiB
}
fn default_audit_capacity() -> usize {
    1_000
}
fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_action_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> HookgateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> HookgateResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency.
    pub fn validate(&self) -> HookgateResult<()> {
        if self.server.listen.is_empty() {
            return Err(HookgateError::Config(
                "server.listen must have at least one address".to_string(),
            ));
        }

        if self.rate_limit.rps <= 0.0 || self.rate_limit.burst == 0 {
            return Err(HookgateError::Config(
                "rate_limit.rps must be positive and rate_limit.burst at least 1".to_string(),
            ));
        }

        if self.gateway.rps <= 0.0 || self.gateway.burst == 0 {
            return Err(HookgateError::Config(
                "gateway.rps must be positive and gateway.burst at least 1".to_string(),
            ));
        }

        if self.gateway.max_concurrent_actions == 0 {
            return Err(HookgateError::Config(
                "gateway.max_concurrent_actions must be at least 1".to_string(),
            ));
        }

        for (name, action) in &self.actions {
            action.validate(name)?;
        }

        for (name, webhook) in &self.webhooks {
            webhook.validate(name, &self.actions)?;
        }

        Ok(())
    }

    /// A copy of the configuration with every webhook secret replaced by
    /// [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for webhook in copy.webhooks.values_mut() {
            if webhook.secret.is_some() {
                webhook.secret = Some(REDACTED.to_string());
            }
            if webhook.signature_secret.is_some() {
                webhook.signature_secret = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

fn expand_non_empty(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    let expanded = expand_env(raw);
    if expanded.is_empty() {
        None
    } else {
        Some(expanded)
    }
}

/// Replace `${VAR}` and `$VAR` with the value of the environment variable.
/// Unset variables expand to the empty string.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            if let Some(end) = braced.find('}') {
                out.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
                rest = &braced[end + 1..];
                continue;
            }
            out.push('$');
            rest = after;
            continue;
        }

        let name_len = after
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        if name_len == 0 {
            out.push('$');
            rest = after;
        } else {
            out.push_str(&std::env::var(&after[..name_len]).unwrap_or_default());
            rest = &after[name_len..];
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  listen: ["0.0.0.0:8080"]
gateway:
  max_concurrent_actions: 4
executor:
  allow_exec: true
webhooks:
  deploy:
    action: notify-slack
    signature_secret: s3cret
    validate_timestamp: true
  sync:
    action: sync-repo
    secret: plain
actions:
  notify-slack:
    kind: http
    url: https://hooks.example.com/{{.channel}}
    body: '{"text": "{{.message}}"}'
    params:
      message:
        required: true
  sync-repo:
    kind: exec
    cmd: git pull
  close-task:
    kind: sql
    source: tasks
    statement: "UPDATE tasks SET done = 1 WHERE id = :id"
    params:
      id:
        type: number
        required: true
"#;

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.gateway.max_concurrent_actions, 4);
        assert_eq!(config.gateway.slot_timeout_ms, 5_000);
        assert_eq!(config.rate_limit.max_tracked, 10_000);
        assert!(config.executor.allow_exec);

        let deploy = &config.webhooks["deploy"];
        assert_eq!(deploy.action, "notify-slack");
        assert_eq!(deploy.timestamp_tolerance_secs(), 300);

        match &config.actions["notify-slack"].kind {
            ActionKind::Http { method, url, .. } => {
                assert!(method.is_none());
                assert!(url.contains("{{.channel}}"));
            }
            other => panic!("unexpected kind: {:?}", other),
        }

        let close = &config.actions["close-task"];
        assert_eq!(close.kind.name(), "sql");
        assert_eq!(close.params["id"].param_type, ParamType::Number);
        assert!(close.params["id"].required);
    }

    #[test]
    fn test_unknown_action_reference_rejected() {
        let yaml = r#"
server:
  listen: ["0.0.0.0:8080"]
webhooks:
  broken:
    action: nope
"#;
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown action 'nope'"));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let mut actions = BTreeMap::new();
        actions.insert(
            "a".to_string(),
            ActionDefinition {
                params: BTreeMap::new(),
                kind: ActionKind::Exec { cmd: "true".into() },
            },
        );
        let webhook = WebhookDefinition {
            action: "a".into(),
            validate_timestamp: true,
            timestamp_tolerance: -5,
            ..Default::default()
        };
        assert!(webhook.validate("w", &actions).is_err());
    }

    #[test]
    fn test_empty_command_rejected() {
        let action = ActionDefinition {
            params: BTreeMap::new(),
            kind: ActionKind::Exec { cmd: "  ".into() },
        };
        assert!(action.validate("blank").is_err());
    }

    #[test]
    fn test_empty_listen_rejected() {
        let yaml = "server:\n  listen: []\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let config = AppConfig::from_yaml(SAMPLE).unwrap();
        let redacted = config.redacted();
        assert_eq!(redacted.webhooks["deploy"].signature_secret.as_deref(), Some(REDACTED));
        assert_eq!(redacted.webhooks["sync"].secret.as_deref(), Some(REDACTED));
        assert!(redacted.webhooks["deploy"].secret.is_none());
        // The original is untouched.
        assert_eq!(config.webhooks["sync"].secret.as_deref(), Some("plain"));
    }

    #[test]
    fn test_expand_env() {
        std::env::set_var("HOOKGATE_TEST_SECRET", "abc123");
        assert_eq!(expand_env("${HOOKGATE_TEST_SECRET}"), "abc123");
        assert_eq!(expand_env("pre-$HOOKGATE_TEST_SECRET-post"), "pre-abc123-post");
        assert_eq!(expand_env("${HOOKGATE_TEST_UNSET_VAR}"), "");
        assert_eq!(expand_env("cost: 5$"), "cost: 5$");
        assert_eq!(expand_env("no vars"), "no vars");
    }

    #[test]
    fn test_secret_accessors() {
        std::env::set_var("HOOKGATE_TEST_SIG", "from-env");
        let webhook = WebhookDefinition {
            action: "a".into(),
            secret: Some(String::new()),
            signature_secret: Some("${HOOKGATE_TEST_SIG}".into()),
            ..Default::default()
        };
        assert_eq!(webhook.secret(), None);
        assert_eq!(webhook.signature_secret().as_deref(), Some("from-env"));
    }

    #[test]
    fn test_effective_max_tracked() {
        let mut rl = RateLimitConfig::default();
        assert_eq!(rl.effective_max_tracked(), 10_000);
        rl.max_tracked = 0;
        assert_eq!(rl.effective_max_tracked(), 10_000);
        rl.max_tracked = 500;
        assert_eq!(rl.effective_max_tracked(), 500);
    }
}
