//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable that turns the cache into a pass-through
pub const DISABLE_CACHE_ENV: &str = "GMP_DISABLE_CACHE";

/// Short alias accepted for the same switch
pub const DISABLE_CACHE_ENV_ALIAS: &str = "DISABLE_CACHE";

/// Directory name under the OS cache dir
pub const CACHE_DIR_NAME: &str = "gradio-mcp-playground";

/// Disk cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory holding one sub-directory per namespace
    #[serde(default = "default_cache_dir")]
    pub root: PathBuf,

    /// Entries older than this are treated as misses
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// When false every `get` misses and every `set` is a no-op
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sub-second TTL set programmatically; wins over `ttl_secs`
    #[serde(skip)]
    ttl_precise: Option<Duration>,
}

// Default value functions
fn default_ttl_secs() -> u64 {
    86_400
} // 24 hours
fn default_enabled() -> bool {
    !disabled_by_env()
}

/// Platform cache directory (`~/.cache`, `~/Library/Caches`, `%LOCALAPPDATA%`)
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(CACHE_DIR_NAME)
}

/// Whether the disable switch is set in the process environment
pub fn disabled_by_env() -> bool {
    [DISABLE_CACHE_ENV, DISABLE_CACHE_ENV_ALIAS]
        .iter()
        .any(|name| std::env::var(name).map(|v| is_truthy(&v)).unwrap_or(false))
}

pub(crate) fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: default_cache_dir(),
            ttl_secs: default_ttl_secs(),
            enabled: default_enabled(),
            ttl_precise: None,
        }
    }
}

impl CacheConfig {
    /// Enabled cache rooted at `root` with the default TTL
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl_secs: default_ttl_secs(),
            enabled: true,
            ttl_precise: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self.ttl_precise = Some(ttl);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// TTL as Duration
    pub fn ttl(&self) -> Duration {
        self.ttl_precise
            .unwrap_or_else(|| Duration::from_secs(self.ttl_secs))
    }
}
