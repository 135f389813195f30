//! Tool argument validation against the declared JSON Schema
//!
//! Only the subset MCP servers use for tool inputs is checked: the top-level
//! `required` list, primitive `type`s of declared properties, `enum`
//! membership, and unknown properties when `additionalProperties` is
//! `false`. Nested schemas are not descended into.

use gmp_foundation::{Error, Result};
use serde_json::{Map, Value};

/// Validate `arguments` for `tool` against `schema`
///
/// `null` arguments are treated as an empty object.
pub fn validate_arguments(tool: &str, schema: &Value, arguments: &Value) -> Result<()> {
    let problems = collect_problems(schema, arguments);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidArguments {
            tool: tool.to_string(),
            problems,
        })
    }
}

fn collect_problems(schema: &Value, arguments: &Value) -> Vec<String> {
    let empty = Map::new();
    let args = match arguments {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => return vec![format!("arguments must be an object, got {}", type_name(other))],
    };

    let mut problems = Vec::new();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(name) {
                problems.push(format!("missing required property '{}'", name));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (name, value) in args {
        match properties.and_then(|p| p.get(name)) {
            Some(property) => check_property(name, property, value, &mut problems),
            None if closed => problems.push(format!("unknown property '{}'", name)),
            None => {}
        }
    }

    problems
}

fn check_property(name: &str, property: &Value, value: &Value, problems: &mut Vec<String>) {
    let allowed: Vec<&str> = match property.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(t, value)) {
        problems.push(format!(
            "property '{}' must be of type {}, got {}",
            name,
            allowed.join(" or "),
            type_name(value)
        ));
        return;
    }

    if let Some(options) = property.get("enum").and_then(Value::as_array) {
        if !options.contains(value) {
            problems.push(format!("property '{}' must be one of {}", name, Value::Array(options.clone())));
        }
    }
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        // 알 수 없는 타입 키워드는 통과
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
