//! Hashing utilities for cache keys and fingerprints
//!
//! Everything here ends up on disk, so only SHA-256 is used (std's
//! `DefaultHasher` is not stable across releases).

use sha2::{Digest, Sha256};
use std::path::Path;

/// Length of the truncated hex digests used in file names and fingerprints
pub const SHORT_HASH_LEN: usize = 16;

/// Full SHA-256 hex digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// First 16 hex chars of the SHA-256 digest
pub fn short_hash(bytes: &[u8]) -> String {
    sha256_hex(bytes)[..SHORT_HASH_LEN].to_string()
}

/// Serialize JSON with object keys sorted at every level
///
/// Two values that differ only in key order produce the same string.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    use serde_json::Value;

    match value {
        Value::Array(arr) => {
            out.push('[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(obj) => {
            out.push('{');
            // Sort keys for consistent hashing
            let mut keys: Vec<_> = obj.keys().collect();
            keys.sort();
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = obj.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Fingerprint of a JSON value, independent of key order
pub fn fingerprint_json(value: &serde_json::Value) -> String {
    short_hash(canonical_json(value).as_bytes())
}

/// Content fingerprint of a file on disk
pub fn fingerprint_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(short_hash(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_fingerprint_order_independent() {
        let obj1 = json!({"a": 1, "b": {"y": [1, 2], "x": null}});
        let obj2 = json!({"b": {"x": null, "y": [1, 2]}, "a": 1});

        assert_eq!(fingerprint_json(&obj1), fingerprint_json(&obj2));
        assert_eq!(canonical_json(&obj1), r#"{"a":1,"b":{"x":null,"y":[1,2]}}"#);
    }

    #[test]
    fn test_json_fingerprint_different_values() {
        let obj1 = json!({"args": ["-y", "server"]});
        let obj2 = json!({"args": ["-y", "server", "--new-arg"]});

        assert_ne!(fingerprint_json(&obj1), fingerprint_json(&obj2));
    }

    #[test]
    fn test_short_hash_is_stable() {
        // sha256("test string")
        assert_eq!(short_hash(b"test string"), "d5579c46dfcc7f18");
        assert_eq!(short_hash(b"test string").len(), SHORT_HASH_LEN);
    }
}
