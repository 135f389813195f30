//! Cache entry and namespace types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Logical partition of the cache store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Tool lists discovered from provider processes
    Provider,
    /// Parsed configuration documents
    Config,
    /// Model initialization data (reserved)
    Model,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Provider, Namespace::Config, Namespace::Model];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Provider => "provider",
            Namespace::Config => "config",
            Namespace::Model => "model",
        }
    }

    /// On-disk directory for this namespace
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::Provider => "servers",
            Namespace::Config => "configs",
            Namespace::Model => "models",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "provider" | "providers" | "server" | "servers" | "mcp" => Ok(Namespace::Provider),
            "config" | "configs" => Ok(Namespace::Config),
            "model" | "models" => Ok(Namespace::Model),
            other => Err(format!(
                "unknown cache type '{}' (expected provider, config or model)",
                other
            )),
        }
    }
}

/// A single persisted cache record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// `<namespace>:<identifier>`
    pub key: String,
    pub namespace: Namespace,
    pub identifier: String,
    /// Redacted payload
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    /// Content hash / launch-spec hash of the source at write time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_fingerprint: Option<String>,
}

impl CacheEntry {
    pub fn new(
        namespace: Namespace,
        identifier: impl Into<String>,
        payload: Value,
        source_fingerprint: Option<String>,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            key: Self::key_for(namespace, &identifier),
            namespace,
            identifier,
            payload,
            created_at: Utc::now(),
            source_fingerprint,
        }
    }

    pub fn key_for(namespace: Namespace, identifier: &str) -> String {
        format!("{}:{}", namespace, identifier)
    }

    /// Age at `now`; clock skew into the future counts as zero
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > ttl
    }

    /// `None` means fingerprinting does not apply to this lookup
    pub fn matches_fingerprint(&self, current: Option<&str>) -> bool {
        match current {
            Some(fp) => self.source_fingerprint.as_deref() == Some(fp),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_aliases() {
        assert_eq!("servers".parse::<Namespace>(), Ok(Namespace::Provider));
        assert_eq!("MCP".parse::<Namespace>(), Ok(Namespace::Provider));
        assert_eq!("configs".parse::<Namespace>(), Ok(Namespace::Config));
        assert_eq!("model".parse::<Namespace>(), Ok(Namespace::Model));
        assert!("tools".parse::<Namespace>().is_err());
    }

    #[test]
    fn test_expiry() {
        let mut entry = CacheEntry::new(Namespace::Provider, "memory", json!([]), None);
        let now = Utc::now();
        assert!(!entry.is_expired(Duration::from_secs(60), now));

        entry.created_at = now - chrono::Duration::hours(25);
        assert!(entry.is_expired(Duration::from_secs(24 * 3600), now));
    }

    #[test]
    fn test_fingerprint_match() {
        let entry = CacheEntry::new(
            Namespace::Config,
            "/etc/app.yaml",
            json!({}),
            Some("abc".to_string()),
        );
        assert_eq!(entry.key, "config:/etc/app.yaml");
        assert!(entry.matches_fingerprint(Some("abc")));
        assert!(!entry.matches_fingerprint(Some("def")));
        assert!(entry.matches_fingerprint(None));
    }
}
