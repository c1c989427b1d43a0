use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ActionError, ActionResult};
use crate::Params;

/// A named data source. Only sources that can run statements take part in
/// SQL actions; others expose reads only.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> anyhow::Result<Vec<Params>>;

    fn as_sql_executor(&self) -> Option<&dyn SqlExecutor> {
        None
    }
}

/// Statement execution capability of a source.
///
/// `args` bind to the `?` placeholders of `query` in order. Implementations
/// must pass them to the driver as bound values and never splice them into
/// the statement text.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Returns the number of rows affected.
    async fn exec(&self, query: &str, args: &[Value]) -> anyhow::Result<u64>;
}

/// Sources available to SQL actions, by name.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn Source>) {
        tracing::info!(source = source.name(), "registered data source");
        self.sources.insert(source.name().to_string(), source);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(name)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Rewrite `:name` placeholders to positional `?` markers.
///
/// Scans left to right once. `::` (a cast such as `value::text`) passes
/// through; a colon not followed by an ASCII letter (`'12:30:00'`) is literal.
/// Names are `[A-Za-z][A-Za-z0-9_]*`. Every occurrence pushes its value, so a
/// name used twice binds twice.
pub fn substitute_params(statement: &str, params: &Params) -> ActionResult<(String, Vec<Value>)> {
    let bytes = statement.as_bytes();
    let mut query = String::with_capacity(statement.len());
    let mut args = Vec::new();
    let mut i = 0;
    let mut literal_start = 0;

    while i < bytes.len() {
        if bytes[i] != b':' {
            i += 1;
            continue;
        }

        if bytes.get(i + 1) == Some(&b':') {
            i += 2;
            continue;
        }

        if !bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            i += 1;
            continue;
        }

        let name_start = i + 1;
        let mut end = name_start;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
            end += 1;
        }

        let name = &statement[name_start..end];
        let value = params
            .get(name)
            .ok_or_else(|| ActionError::UndefinedParam(name.to_string()))?;

        query.push_str(&statement[literal_start..i]);
        query.push('?');
        args.push(value.clone());

        i = end;
        literal_start = end;
    }

    query.push_str(&statement[literal_start..]);
    Ok((query, args))
}

pub(crate) async fn run(
    sources: &SourceRegistry,
    source_name: &str,
    statement: &str,
    params: &Params,
    timeout: Duration,
) -> ActionResult<()> {
    let source = sources
        .get(source_name)
        .ok_or_else(|| ActionError::SourceNotFound(source_name.to_string()))?;
    let executor = source
        .as_sql_executor()
        .ok_or_else(|| ActionError::NotSqlSource(source_name.to_string()))?;

    let (query, args) = substitute_params(statement, params)?;

    let rows = tokio::time::timeout(timeout, executor.exec(&query, &args))
        .await
        .map_err(|_| ActionError::Timeout {
            what: "SQL statement",
            secs: timeout.as_secs(),
        })?
        .map_err(ActionError::Sql)?;

    tracing::debug!(source = source_name, rows, "SQL action executed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn replaces_named_with_positional() {
        let p = params(json!({"id": 42, "title": "x"}));
        let (query, args) =
            substitute_params("UPDATE tasks SET title = :title WHERE id = :id", &p).unwrap();
        assert_eq!(query, "UPDATE tasks SET title = ? WHERE id = ?");
        assert_eq!(args, vec![json!("x"), json!(42)]);
    }

    #[test]
    fn keeps_casts_and_time_literals() {
        let p = params(json!({"id": "7"}));
        let (query, args) = substitute_params(
            "SELECT :id::int, '12:30:00' FROM t WHERE ts > '2024-01-01 00:00'",
            &p,
        )
        .unwrap();
        assert_eq!(query, "SELECT ?::int, '12:30:00' FROM t WHERE ts > '2024-01-01 00:00'");
        assert_eq!(args, vec![json!("7")]);
    }

    #[test]
    fn colon_at_end_and_repeated_names() {
        let p = params(json!({"a": 1}));
        let (query, args) = substitute_params("x = :a OR y = :a:", &p).unwrap();
        assert_eq!(query, "x = ? OR y = ?:");
        assert_eq!(args, vec![json!(1), json!(1)]);
    }

    #[test]
    fn value_is_never_inlined() {
        let p = params(json!({"name": "'; DROP TABLE users; --"}));
        let (query, args) =
            substitute_params("INSERT INTO users (name) VALUES (:name)", &p).unwrap();
        assert_eq!(query, "INSERT INTO users (name) VALUES (?)");
        assert_eq!(args, vec![json!("'; DROP TABLE users; --")]);
    }

    #[test]
    fn undefined_placeholder_is_an_error() {
        let err = substitute_params("DELETE FROM t WHERE id = :id", &Params::new()).unwrap_err();
        assert_eq!(err.to_string(), "undefined parameter \"id\" in SQL statement");
    }
}
