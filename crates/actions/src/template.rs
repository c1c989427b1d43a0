//! `{{.field}}` placeholder expansion for action URLs, bodies, headers and
//! commands.
//!
//! Only field references are supported: `{{.name}}`, nested paths such as
//! `{{ .user.email }}`, and `{{.}}` for the whole parameter object. Strings
//! render raw, `null` renders empty, arrays and objects render as JSON.

use serde_json::Value;

use crate::Params;

pub fn expand(text: &str, params: &Params) -> Result<String, String> {
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| "unclosed placeholder".to_string())?;
        let expr = after[..end].trim();
        out.push_str(&render(lookup(expr, params)?));
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn lookup<'a>(expr: &str, params: &'a Params) -> Result<Lookup<'a>, String> {
    let path = expr
        .strip_prefix('.')
        .ok_or_else(|| format!("unsupported expression \"{}\"", expr))?;

    if path.is_empty() {
        return Ok(Lookup::Root(params));
    }

    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = params
        .get(first)
        .ok_or_else(|| format!("no field \"{}\"", first))?;

    for segment in segments {
        current = match current {
            Value::Object(map) => map
                .get(segment)
                .ok_or_else(|| format!("no field \"{}\" in \"{}\"", segment, path))?,
            _ => return Err(format!("\"{}\" is not an object", path)),
        };
    }

    Ok(Lookup::Value(current))
}

enum Lookup<'a> {
    Root(&'a Params),
    Value(&'a Value),
}

fn render(lookup: Lookup<'_>) -> String {
    match lookup {
        Lookup::Root(map) => serde_json::to_string(map).unwrap_or_default(),
        Lookup::Value(Value::Null) => String::new(),
        Lookup::Value(Value::String(s)) => s.clone(),
        Lookup::Value(Value::Bool(b)) => b.to_string(),
        Lookup::Value(Value::Number(n)) => n.to_string(),
        Lookup::Value(other) => other.to_string(),
    }
}
