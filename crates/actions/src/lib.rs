//! Action execution for hookgate.
//!
//! An [`ActionExecutor`] turns a validated request into one side effect: a
//! parameterized SQL statement against a registered [`Source`], an outbound
//! HTTP call, or a shell command. Parameters are checked against the action's
//! declarations first; nothing runs when validation fails.
//!
//! Safety rules per kind:
//!
//! - **SQL**: `:name` placeholders become positional `?` markers and values
//!   are bound, never formatted into the statement.
//! - **HTTP**: the expanded URL is checked for internal targets before any
//!   request is sent, and redirects are not followed.
//! - **Exec**: off unless explicitly allowed; the expanded command may not
//!   contain shell metacharacters.

pub mod error;
pub mod exec;
pub mod http;
pub mod params;
pub mod sql;
pub mod ssrf;
pub mod template;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use hookgate_common::{ActionDefinition, ActionKind, ExecutorConfig};

pub use error::{ActionError, ActionResult};
pub use sql::{Source, SourceRegistry, SqlExecutor};

/// Request parameters as decoded from JSON.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Something that can run an action. The webhook gateway depends on this
/// rather than on [`ActionExecutor`] directly.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, action: &ActionDefinition, params: &Params) -> ActionResult<()>;
}

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub allow_exec: bool,
    pub allow_private_targets: bool,
    pub working_dir: PathBuf,
    pub timeout: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            allow_exec: false,
            allow_private_targets: false,
            working_dir: PathBuf::from("."),
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ExecutorConfig> for ExecutorOptions {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            allow_exec: config.allow_exec,
            allow_private_targets: config.allow_private_targets,
            working_dir: config.working_dir.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }
}

pub struct ActionExecutor {
    options: ExecutorOptions,
    sources: SourceRegistry,
    client: reqwest::Client,
}

impl ActionExecutor {
    pub fn new(options: ExecutorOptions, sources: SourceRegistry) -> ActionResult<Self> {
        tracing::info!(
            allow_exec = options.allow_exec,
            allow_private_targets = options.allow_private_targets,
            sources = sources.len(),
            "creating action executor"
        );
        let client = http::build_client(options.timeout)?;
        Ok(Self {
            options,
            sources,
            client,
        })
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Validate `params` against the action's declarations, then run it.
    pub async fn execute(&self, action: &ActionDefinition, params: &Params) -> ActionResult<()> {
        let params = params::prepare(&action.params, params)?;

        match &action.kind {
            ActionKind::Sql { source, statement } => {
                sql::run(&self.sources, source, statement, &params, self.options.timeout).await
            }
            ActionKind::Http {
                url,
                method,
                body,
                headers,
            } => {
                let request = http::HttpAction {
                    url,
                    method: method.as_deref(),
                    body: body.as_deref(),
                    headers,
                };
                http::run(&self.client, request, &params, self.options.allow_private_targets).await
            }
            ActionKind::Exec { cmd } => {
                if !self.options.allow_exec {
                    return Err(ActionError::ExecDisabled);
                }
                exec::run(cmd, &params, &self.options.working_dir, self.options.timeout).await
            }
        }
    }
}

#[async_trait]
impl ActionRunner for ActionExecutor {
    async fn run(&self, action: &ActionDefinition, params: &Params) -> ActionResult<()> {
        self.execute(action, params).await
    }
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("options", &self.options)
            .field("sources", &self.sources)
            .finish()
    }
}
