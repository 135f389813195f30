//! Settings - 전역 설정
//!
//! 우선순위: CLI 플래그 > 환경 변수 > settings.toml > 기본값
//!
//! ```toml
//! [cache]
//! dir = "/tmp/gmp-cache"
//! ttl_secs = 86400
//! enabled = true
//!
//! [providers]
//! servers_file = "/home/me/.gradio-mcp/mcp_servers.json"
//! handshake_timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cache::config::is_truthy;
use crate::cache::{default_cache_dir, CacheConfig, DISABLE_CACHE_ENV, DISABLE_CACHE_ENV_ALIAS};
use crate::registry::{ProvidersFile, DEFAULT_HANDSHAKE_TIMEOUT_SECS};
use crate::{Error, Result};

/// 설정 파일명
pub const SETTINGS_FILE: &str = "settings.toml";

/// `dirs::config_dir()` 아래 앱 디렉토리
pub const APP_DIR_NAME: &str = "gradio-mcp";

// Environment overrides
pub const ENV_CACHE_DIR: &str = "GMP_CACHE_DIR";
pub const ENV_CACHE_TTL_SECS: &str = "GMP_CACHE_TTL_SECS";
pub const ENV_HANDSHAKE_TIMEOUT_SECS: &str = "GMP_HANDSHAKE_TIMEOUT_SECS";
pub const ENV_SERVERS_FILE: &str = "GMP_SERVERS_FILE";

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub providers: ProviderSettings,
}

/// `[cache]` 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// 캐시 루트 (없으면 플랫폼 캐시 디렉토리)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: default_ttl_secs(),
            enabled: true,
        }
    }
}

/// `[providers]` 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// mcpServers 파일 경로
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers_file: Option<PathBuf>,

    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            servers_file: None,
            handshake_timeout_secs: default_handshake_timeout_secs(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    86_400
}

fn default_true() -> bool {
    true
}

fn default_handshake_timeout_secs() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_SECS
}

impl Settings {
    /// 기본 설정 파일 경로 (`~/.config/gradio-mcp/settings.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(SETTINGS_FILE))
    }

    /// 기본 경로에서 로드 + 환경 변수 적용
    ///
    /// 파일이 없으면 기본값을 사용한다.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        settings.apply_env()?;
        Ok(settings)
    }

    /// 지정한 파일에서 로드 (환경 변수는 적용하지 않음)
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ConfigNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let settings = Self::parse(path, &content)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            line: e.span().map(|span| line_at(content, span.start)),
            message: e.message().to_string(),
        })
    }

    /// 프로세스 환경 변수 적용
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// 환경 변수 적용 (조회 함수 주입)
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            self.cache.dir = Some(PathBuf::from(dir));
        }

        if let Some(ttl) = lookup(ENV_CACHE_TTL_SECS) {
            self.cache.ttl_secs = parse_secs(ENV_CACHE_TTL_SECS, &ttl)?;
        }

        let disabled = [DISABLE_CACHE_ENV, DISABLE_CACHE_ENV_ALIAS]
            .iter()
            .any(|name| lookup(name).map(|v| is_truthy(&v)).unwrap_or(false));
        if disabled {
            self.cache.enabled = false;
        }

        if let Some(secs) = lookup(ENV_HANDSHAKE_TIMEOUT_SECS) {
            self.providers.handshake_timeout_secs = parse_secs(ENV_HANDSHAKE_TIMEOUT_SECS, &secs)?;
        }

        if let Some(file) = lookup(ENV_SERVERS_FILE).filter(|v| !v.trim().is_empty()) {
            self.providers.servers_file = Some(PathBuf::from(file));
        }

        Ok(())
    }

    // ========================================================================
    // Derived values
    // ========================================================================

    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(default_cache_dir)
    }

    pub fn cache_config(&self) -> CacheConfig {
        let config = CacheConfig::at(self.cache_dir())
            .with_ttl(Duration::from_secs(self.cache.ttl_secs));
        if self.cache.enabled {
            config
        } else {
            config.disabled()
        }
    }

    /// Providers 파일 경로 (설정 > 기본 경로)
    pub fn servers_file(&self) -> Option<PathBuf> {
        self.providers
            .servers_file
            .clone()
            .or_else(ProvidersFile::default_path)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.providers.handshake_timeout_secs)
    }

    // ========================================================================
    // Builder (CLI 플래그 적용용)
    // ========================================================================

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = Some(dir.into());
        self
    }

    pub fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.cache.ttl_secs = secs;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{} must be a number of seconds, got '{}'", name, value)))
}

/// 바이트 오프셋 -> 1부터 시작하는 줄 번호
pub fn line_at(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    content.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cache.ttl_secs, 86_400);
        assert!(settings.cache.enabled);
        assert_eq!(settings.handshake_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            "[cache]\ndir = \"/tmp/gmp\"\nttl_secs = 60\n\n[providers]\nhandshake_timeout_secs = 3\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.cache_dir(), PathBuf::from("/tmp/gmp"));
        assert_eq!(settings.cache.ttl_secs, 60);
        assert!(settings.cache.enabled);
        assert_eq!(settings.handshake_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "[cache]\nttl_secs = 60\nenabled = = true\n").unwrap();

        match Settings::load_from(&path) {
            Err(Error::ConfigParse { line, .. }) => assert_eq!(line, Some(3)),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Settings::load_from(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings
            .apply_env_from(env(&[
                (ENV_CACHE_DIR, "/var/cache/gmp"),
                (ENV_CACHE_TTL_SECS, "120"),
                (DISABLE_CACHE_ENV, "1"),
                (ENV_HANDSHAKE_TIMEOUT_SECS, "5"),
                (ENV_SERVERS_FILE, "/etc/gmp/servers.json"),
            ]))
            .unwrap();

        assert_eq!(settings.cache_dir(), PathBuf::from("/var/cache/gmp"));
        assert_eq!(settings.cache.ttl_secs, 120);
        assert!(!settings.cache.enabled);
        assert!(!settings.cache_config().enabled);
        assert_eq!(settings.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(
            settings.servers_file(),
            Some(PathBuf::from("/etc/gmp/servers.json"))
        );
    }

    #[test]
    fn test_disable_alias_and_falsy_values() {
        let mut settings = Settings::default();
        settings.apply_env_from(env(&[(DISABLE_CACHE_ENV, "0")])).unwrap();
        assert!(settings.cache.enabled);

        settings.apply_env_from(env(&[(DISABLE_CACHE_ENV_ALIAS, "true")])).unwrap();
        assert!(!settings.cache.enabled);
    }

    #[test]
    fn test_invalid_env_number() {
        let mut settings = Settings::default();
        let result = settings.apply_env_from(env(&[(ENV_CACHE_TTL_SECS, "a day")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_line_at() {
        let content = "a\nb\nc";
        assert_eq!(line_at(content, 0), 1);
        assert_eq!(line_at(content, 2), 2);
        assert_eq!(line_at(content, 4), 3);
        assert_eq!(line_at(content, 100), 3);
    }
}
