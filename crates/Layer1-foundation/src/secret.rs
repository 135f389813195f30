//! Secret provisioning for provider launches
//!
//! Provider specs name the secrets they need (`"secrets": ["GITHUB_TOKEN"]`)
//! and the values are fetched here at launch time. A `Credential` has no
//! `Serialize` impl and its `Debug`/`Display` never show the value, so it
//! cannot end up in a cache entry or a log line by accident.

use std::collections::HashMap;
use std::fmt;

use crate::cache::REDACTED;

/// Secret value handed to a provider process environment
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw value; only for building a child environment
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", REDACTED)
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// SecretProvider
// ============================================================================

/// Source of secret values, looked up by environment variable name
pub trait SecretProvider: Send + Sync {
    fn get(&self, name: &str) -> Option<Credential>;
}

impl<F> SecretProvider for F
where
    F: Fn(&str) -> Option<Credential> + Send + Sync,
{
    fn get(&self, name: &str) -> Option<Credential> {
        self(name)
    }
}

/// Reads secrets from the current process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn get(&self, name: &str) -> Option<Credential> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Credential::from)
    }
}

/// Fixed in-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: HashMap<String, Credential>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Credential>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretProvider for StaticSecrets {
    fn get(&self, name: &str) -> Option<Credential> {
        self.values.get(name).cloned()
    }
}

/// Provides nothing; any spec that lists secrets fails to launch
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

impl SecretProvider for NoSecrets {
    fn get(&self, _name: &str) -> Option<Credential> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_never_printed() {
        let cred = Credential::new("ghp_supersecret");

        assert!(!format!("{:?}", cred).contains("ghp_supersecret"));
        assert!(!cred.to_string().contains("ghp_supersecret"));
        assert_eq!(cred.expose(), "ghp_supersecret");
    }

    #[test]
    fn test_static_secrets() {
        let secrets = StaticSecrets::new().with("GITHUB_TOKEN", "abc");

        assert_eq!(secrets.get("GITHUB_TOKEN").unwrap().expose(), "abc");
        assert!(secrets.get("OTHER").is_none());
        assert!(NoSecrets.get("GITHUB_TOKEN").is_none());
    }

    #[test]
    fn test_closure_provider() {
        let provider = |name: &str| (name == "TOKEN").then(|| Credential::from("t"));
        let provider: &dyn SecretProvider = &provider;

        assert!(provider.get("TOKEN").is_some());
        assert!(provider.get("KEY").is_none());
    }
}
