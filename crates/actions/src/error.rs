use thiserror::Error;

/// Failure of a single action invocation.
///
/// Validation variants are returned before anything is executed; the rest
/// describe an execution that was attempted and failed.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("required parameter \"{0}\" is missing")]
    MissingParam(String),

    #[error("parameter \"{name}\" must be a {expected}")]
    InvalidParam { name: String, expected: &'static str },

    #[error("undefined parameter \"{0}\" in SQL statement")]
    UndefinedParam(String),

    #[error("failed to expand {field} template: {reason}")]
    Template { field: &'static str, reason: String },

    #[error("source \"{0}\" not found")]
    SourceNotFound(String),

    #[error("source \"{0}\" does not support SQL execution")]
    NotSqlSource(String),

    #[error("SQL execution failed: {0}")]
    Sql(#[source] anyhow::Error),

    #[error("URL validation failed: {0}")]
    UrlBlocked(String),

    #[error("request body too large: {size} bytes (max {max})")]
    BodyTooLarge { size: usize, max: usize },

    #[error("invalid HTTP method \"{0}\"")]
    InvalidMethod(String),

    #[error("invalid header \"{0}\"")]
    InvalidHeader(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("exec actions disabled (use --allow-exec flag)")]
    ExecDisabled,

    #[error("{0}")]
    UnsafeCommand(&'static str),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("{what} timed out after {secs}s")]
    Timeout { what: &'static str, secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ActionError {
    /// True for errors raised before any side effect took place.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ActionError::MissingParam(_)
                | ActionError::InvalidParam { .. }
                | ActionError::UndefinedParam(_)
                | ActionError::Template { .. }
                | ActionError::UrlBlocked(_)
                | ActionError::BodyTooLarge { .. }
                | ActionError::InvalidMethod(_)
                | ActionError::InvalidHeader(_)
                | ActionError::ExecDisabled
                | ActionError::UnsafeCommand(_)
        )
    }
}

pub type ActionResult<T> = Result<T, ActionError>;
