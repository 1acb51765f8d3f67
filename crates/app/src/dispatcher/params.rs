//! Request parameter merging and coercion against an endpoint's schema.

use std::collections::BTreeMap;

use council_domain::automation::{Endpoint, EndpointParameter, ParamType};
use serde_json::{Number, Value};

use crate::handler::Params;

/// Merge parameter sources. Later sources win: query, then body fields,
/// then path placeholders.
#[must_use]
pub fn merge(query: Params, body: Option<Value>, path: BTreeMap<String, String>) -> Params {
    let mut params = query;
    if let Some(Value::Object(fields)) = body {
        params.extend(fields);
    }
    params.extend(path.into_iter().map(|(k, v)| (k, Value::String(v))));
    params
}

/// Apply defaults and coerce every declared parameter to its declared type.
/// Undeclared parameters pass through untouched.
///
/// # Errors
///
/// Returns one message listing every missing or unconvertible parameter.
pub fn coerce(endpoint: &Endpoint, mut params: Params) -> Result<Params, String> {
    let mut problems = Vec::new();
    for parameter in &endpoint.parameters {
        match params.remove(&parameter.name).filter(|v| !v.is_null()) {
            Some(value) => match convert(parameter.kind, value) {
                Some(converted) => {
                    params.insert(parameter.name.clone(), converted);
                }
                None => problems.push(format!("{}: expected {}", parameter.name, parameter.kind)),
            },
            None => fill_missing(parameter, &mut params, &mut problems),
        }
    }
    if problems.is_empty() {
        Ok(params)
    } else {
        Err(problems.join("; "))
    }
}

fn fill_missing(parameter: &EndpointParameter, params: &mut Params, problems: &mut Vec<String>) {
    if let Some(default) = &parameter.default {
        params.insert(parameter.name.clone(), default.clone());
    } else if parameter.required {
        problems.push(format!("{}: field required", parameter.name));
    }
}

fn convert(kind: ParamType, value: Value) -> Option<Value> {
    match (kind, value) {
        (ParamType::String | ParamType::File, Value::String(s)) => Some(Value::String(s)),
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ParamType::Integer, Value::Number(n)) => n.as_i64().map(Value::from),
        (ParamType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ParamType::Float, Value::Number(n)) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
        (ParamType::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        (ParamType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        (ParamType::Object, value @ Value::Object(_)) | (ParamType::Array, value @ Value::Array(_)) => {
            Some(value)
        }
        (ParamType::Object, Value::String(s)) => {
            serde_json::from_str::<Value>(&s).ok().filter(Value::is_object)
        }
        (ParamType::Array, Value::String(s)) => {
            serde_json::from_str::<Value>(&s).ok().filter(Value::is_array)
        }
        _ => None,
    }
}
