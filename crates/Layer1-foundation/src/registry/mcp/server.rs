use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use crate::cache::{fingerprint_json, is_secret_key, REDACTED};
use crate::{Error, Result};

/// 설정 파일명
pub const PROVIDERS_FILE: &str = "mcp_servers.json";

/// 홈 디렉토리 아래 앱 디렉토리
pub const PROVIDERS_DIR: &str = ".gradio-mcp";

/// 핸드셰이크 기본 타임아웃 (초)
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// 개별 MCP 서버 (tool provider) 실행 설정
///
/// Claude Desktop 호환 형식:
/// ```json
/// {
///   "command": "npx",
///   "args": ["-y", "@modelcontextprotocol/server-memory"],
///   "env": { "NODE_ENV": "production", "HOME_DIR": "${HOME}" },
///   "secrets": ["GITHUB_TOKEN"]
/// }
/// ```
///
/// `secrets`에 나열된 변수는 파일에 값이 없고, 실행 시점에
/// `SecretProvider`에서 받아 환경에 주입된다.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// 서버 이름 (파일에서는 mcpServers의 키)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// 전송 타입 (stdio만 지원)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,

    /// 활성화 여부
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 실행 명령어
    #[serde(default)]
    pub command: String,

    /// 명령어 인자
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// 환경 변수 (${VAR} 형식 지원, 실행 시점에 확장)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// SecretProvider에서 가져올 환경 변수 이름
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    /// 버전 태그 (바뀌면 캐시된 툴 목록이 무효화됨)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// 작업 디렉토리
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,

    /// 핸드셰이크 타임아웃 (초), 없으면 전역 설정
    #[serde(
        default,
        alias = "handshake_timeout_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub handshake_timeout_secs: Option<u64>,

    /// 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: None,
            enabled: true,
            command: command.into(),
            args: vec![],
            env: BTreeMap::new(),
            secrets: vec![],
            version: None,
            cwd: None,
            handshake_timeout_secs: None,
            description: None,
        }
    }

    /// 유효성 검증
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("provider requires a name".to_string());
        }
        if let Some(transport) = &self.transport {
            if !transport.eq_ignore_ascii_case("stdio") {
                return Err(format!("unsupported transport '{}'", transport));
            }
        }
        if self.command.trim().is_empty() {
            return Err("stdio server requires 'command'".to_string());
        }
        Ok(())
    }

    /// 캐시 fingerprint
    ///
    /// name / command / args / version 만 포함한다. env와 secrets는 제외.
    pub fn fingerprint(&self) -> String {
        fingerprint_json(&json!({
            "name": self.name,
            "command": self.command,
            "args": self.args,
            "version": self.version,
        }))
    }

    /// 환경변수 확장 (${VAR} 또는 ${VAR:-default})
    pub fn expand_env(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), expand_env_var(v)))
            .collect()
    }

    pub fn effective_timeout(&self, default: Duration) -> Duration {
        self.handshake_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    // === Builder methods ===

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.cwd = Some(path.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn secret(mut self, name: impl Into<String>) -> Self {
        self.secrets.push(name.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn handshake_timeout(mut self, secs: u64) -> Self {
        self.handshake_timeout_secs = Some(secs);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// env에 토큰이 직접 들어있을 수 있으므로 Debug 출력에서 가린다
impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env: BTreeMap<&str, &str> = self
            .env
            .iter()
            .map(|(k, v)| {
                let shown = if is_secret_key(k) { REDACTED } else { v.as_str() };
                (k.as_str(), shown)
            })
            .collect();

        f.debug_struct("ProviderSpec")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &env)
            .field("secrets", &self.secrets)
            .field("version", &self.version)
            .field("cwd", &self.cwd)
            .field("handshake_timeout_secs", &self.handshake_timeout_secs)
            .finish()
    }
}

/// Claude Desktop 호환 providers 파일 구조
///
/// `~/.gradio-mcp/mcp_servers.json`:
/// ```json
/// {
///   "mcpServers": {
///     "memory": {
///       "command": "npx",
///       "args": ["-y", "@modelcontextprotocol/server-memory"]
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersFile {
    #[serde(default, rename = "mcpServers")]
    pub servers: BTreeMap<String, ProviderSpec>,
}

impl ProvidersFile {
    /// 기본 경로 (`~/.gradio-mcp/mcp_servers.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(PROVIDERS_DIR).join(PROVIDERS_FILE))
    }

    /// 파싱된 문서에서 생성 (이름은 맵 키로 채움)
    pub fn from_value(value: Value) -> Result<Self> {
        let mut file: ProvidersFile = serde_json::from_value(value)
            .map_err(|e| Error::Config(format!("invalid providers file: {}", e)))?;
        for (name, spec) in file.servers.iter_mut() {
            spec.name = name.clone();
        }
        Ok(file)
    }

    pub fn add(&mut self, spec: ProviderSpec) {
        self.servers.insert(spec.name.clone(), spec);
    }

    pub fn get(&self, name: &str) -> Option<&ProviderSpec> {
        self.servers.get(name)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// 활성화된 서버만 (이름 순)
    pub fn enabled(&self) -> impl Iterator<Item = &ProviderSpec> {
        self.servers.values().filter(|s| s.enabled)
    }

    /// 유효성 검증
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let errors: Vec<_> = self
            .servers
            .iter()
            .filter_map(|(name, s)| s.validate().err().map(|e| format!("{}: {}", name, e)))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

static ENV_DEFAULT: OnceLock<Regex> = OnceLock::new();
static ENV_SIMPLE: OnceLock<Regex> = OnceLock::new();

/// 환경변수 확장
/// - ${VAR}: 환경변수 값
/// - ${VAR:-default}: 환경변수가 없으면 기본값
pub fn expand_env_var(value: &str) -> String {
    let re_default =
        ENV_DEFAULT.get_or_init(|| Regex::new(r"\$\{([^}:]+):-([^}]*)\}").unwrap());
    let result = re_default.replace_all(value, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[2].to_string())
    });

    let re_simple = ENV_SIMPLE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").unwrap());
    re_simple
        .replace_all(&result, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .to_string()
}

fn default_true() -> bool {
    true
}
