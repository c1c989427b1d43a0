use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use hookgate_common::{ParamDef, ParamType};

use crate::error::{ActionError, ActionResult};
use crate::Params;

/// Apply declared defaults, then check required parameters and declared
/// types. Returns the parameters the action will actually run with.
pub fn prepare(defs: &BTreeMap<String, ParamDef>, params: &Params) -> ActionResult<Params> {
    let mut resolved = params.clone();

    for (name, def) in defs {
        if resolved.contains_key(name) {
            continue;
        }
        if let Some(default) = &def.default {
            resolved.insert(name.clone(), default_value(def.param_type, default));
        }
    }

    for (name, def) in defs {
        let value = resolved.get(name);

        if def.required && is_missing(value) {
            return Err(ActionError::MissingParam(name.clone()));
        }

        if let Some(value) = value {
            if !value.is_null() && !matches_type(def.param_type, value) {
                return Err(ActionError::InvalidParam {
                    name: name.clone(),
                    expected: type_name(def.param_type),
                });
            }
        }
    }

    Ok(resolved)
}

/// Absent, `null` and `""` all count as missing.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn default_value(param_type: ParamType, raw: &str) -> Value {
    match param_type {
        ParamType::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(raw.to_string())),
        ParamType::Bool => match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        ParamType::String | ParamType::Date => Value::String(raw.to_string()),
    }
}

// Form submissions deliver everything as strings, so numeric and boolean
// strings are accepted as well.
fn matches_type(param_type: ParamType, value: &Value) -> bool {
    match param_type {
        ParamType::String => true,
        ParamType::Number => match value {
            Value::Number(_) => true,
            Value::String(s) => s.trim().parse::<f64>().is_ok(),
            _ => false,
        },
        ParamType::Bool => match value {
            Value::Bool(_) => true,
            Value::String(s) => matches!(s.as_str(), "true" | "false"),
            _ => false,
        },
        ParamType::Date => match value {
            Value::String(s) => is_date(s),
            _ => false,
        },
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

fn type_name(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::String => "string",
        ParamType::Number => "number",
        ParamType::Bool => "bool",
        ParamType::Date => "date",
    }
}
