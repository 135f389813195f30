//! Secret redaction for cached payloads
//!
//! Cached data must never carry credentials. Any map key that looks like a
//! secret (`*_KEY`, `*_TOKEN`, `*_SECRET`, `*_PASSWORD`, `apiKey`, ...) has its
//! whole value replaced before the entry is written, arrays and booleans
//! included. Only object values under such keys are walked, so a JSON schema
//! describing an `api_key` property keeps its shape.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Replacement written in place of secret values
pub const REDACTED: &str = "***REDACTED***";

static SECRET_KEY: OnceLock<Regex> = OnceLock::new();

fn secret_key_regex() -> &'static Regex {
    SECRET_KEY.get_or_init(|| {
        Regex::new(
            r"^(?:.*_)?(?:api_?key|key|token|secret|password|passwd|credentials?|private_key)$",
        )
        .unwrap()
    })
}

/// `clientSecret` / `Client-Secret` / `CLIENT_SECRET` -> `client_secret`
fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower = false;
    for ch in key.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        match ch {
            '-' | '.' | ' ' => out.push('_'),
            c => out.push(c.to_ascii_lowercase()),
        }
    }
    out
}

/// Whether a map key names secret material
pub fn is_secret_key(key: &str) -> bool {
    secret_key_regex().is_match(&normalize_key(key))
}

/// Values under a secret key that get replaced wholesale
fn is_sensitive_value(value: &Value) -> bool {
    match value {
        Value::String(s) => s != REDACTED,
        Value::Object(_) | Value::Null => false,
        Value::Number(_) | Value::Bool(_) | Value::Array(_) => true,
    }
}

/// Redact in place, returning the number of replaced values
pub fn redact_in_place(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let mut count = 0;
            for (key, child) in map.iter_mut() {
                if is_secret_key(key) && is_sensitive_value(child) {
                    *child = Value::String(REDACTED.to_string());
                    count += 1;
                } else {
                    count += redact_in_place(child);
                }
            }
            count
        }
        Value::Array(items) => items.iter_mut().map(redact_in_place).sum(),
        _ => 0,
    }
}

/// Redacted copy of `value`
pub fn redact(value: &Value) -> Value {
    let mut copy = value.clone();
    redact_in_place(&mut copy);
    copy
}

/// Whether `value` holds any literal secret that `redact` would remove
pub fn contains_secrets(value: &Value) -> bool {
    match value {
        Value::Object(map) => map
            .iter()
            .any(|(k, v)| (is_secret_key(k) && is_sensitive_value(v)) || contains_secrets(v)),
        Value::Array(items) => items.iter().any(contains_secrets),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secret_key_detection() {
        for key in [
            "API_KEY",
            "OPENAI_API_KEY",
            "apiKey",
            "GITHUB_PERSONAL_ACCESS_TOKEN",
            "access_token",
            "client_secret",
            "clientSecret",
            "password",
            "DB_PASSWORD",
            "token",
            "credentials",
        ] {
            assert!(is_secret_key(key), "{} should be secret", key);
        }

        for key in [
            "command",
            "args",
            "max_tokens",
            "keyboard",
            "monkey",
            "inputSchema",
            "secrets",
            "description",
        ] {
            assert!(!is_secret_key(key), "{} should not be secret", key);
        }
    }

    #[test]
    fn test_redacts_nested_values() {
        let data = json!({
            "command": "npx",
            "args": ["server"],
            "env": {"API_KEY": "secret123", "TOKEN": "secret456", "NODE_ENV": "production"},
            "servers": [{"auth": {"password": "hunter2"}}]
        });

        let redacted = redact(&data);
        let text = redacted.to_string();

        assert!(!text.contains("secret123"));
        assert!(!text.contains("secret456"));
        assert!(!text.contains("hunter2"));
        assert_eq!(redacted["env"]["NODE_ENV"], "production");
        assert_eq!(redacted["env"]["API_KEY"], REDACTED);
        assert_eq!(redacted["command"], "npx");
    }

    #[test]
    fn test_schema_shape_preserved() {
        let schema = json!({
            "type": "object",
            "properties": {
                "api_key": {"type": "string", "description": "Key to use"},
                "key": {"type": "string"}
            },
            "required": ["key"]
        });

        assert_eq!(redact(&schema), schema);
        assert!(!contains_secrets(&schema));
    }

    #[test]
    fn test_contains_secrets() {
        assert!(contains_secrets(&json!({"a": {"OPENAI_API_KEY": "sk-1"}})));
        assert!(!contains_secrets(&json!({"a": {"OPENAI_API_KEY": REDACTED}})));
        assert!(!contains_secrets(&json!({"max_tokens": 1024})));
    }

    #[test]
    fn test_array_and_bool_secrets_replaced_whole() {
        let data = json!({
            "env": {"API_KEY": ["sk-live-123", "sk-live-456"], "TOKEN": true},
            "tokens": [{"password": ["hunter2"]}],
            "args": ["--verbose"]
        });

        assert!(contains_secrets(&data));
        let redacted = redact(&data);

        assert!(!redacted.to_string().contains("sk-live"));
        assert!(!redacted.to_string().contains("hunter2"));
        assert_eq!(redacted["env"]["API_KEY"], REDACTED);
        assert_eq!(redacted["env"]["TOKEN"], REDACTED);
        assert_eq!(redacted["tokens"][0]["password"], REDACTED);
        assert_eq!(redacted["args"], json!(["--verbose"]));
        assert!(!contains_secrets(&redacted));
    }

    #[test]
    fn test_null_secret_left_alone() {
        let data = json!({"api_key": null});
        assert!(!contains_secrets(&data));
        assert_eq!(redact(&data), data);
    }
}
