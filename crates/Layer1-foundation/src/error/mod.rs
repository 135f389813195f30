//! Error types for the playground
//!
//! 모든 에러를 중앙에서 관리

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Playground 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 캐시 관련 (호출자에게는 miss / no-op 으로 취급됨)
    // ========================================================================
    #[error("Cache I/O error: {0}")]
    CacheIo(String),

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("{}", format_parse_error(path, *line, message))]
    ConfigParse {
        path: PathBuf,
        line: Option<usize>,
        message: String,
    },

    // ========================================================================
    // Provider 관련
    // ========================================================================
    #[error("Failed to launch provider '{provider}': {reason}")]
    ProviderLaunch { provider: String, reason: String },

    #[error("Provider '{provider}' did not complete the handshake within {}ms", timeout.as_millis())]
    ProviderHandshakeTimeout { provider: String, timeout: Duration },

    #[error("Provider '{provider}' handshake failed: {reason}")]
    ProviderHandshakeProtocol { provider: String, reason: String },

    #[error("Provider '{provider}' exited unexpectedly")]
    ProviderExited { provider: String },

    #[error("Provider '{0}' is stopped")]
    ProviderStopped(String),

    #[error("Provider '{provider}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        provider: String,
        code: i64,
        message: String,
    },

    #[error("Provider '{provider}' did not answer '{method}' within {}ms", timeout.as_millis())]
    RequestTimeout {
        provider: String,
        method: String,
        timeout: Duration,
    },

    // ========================================================================
    // Tool 관련
    // ========================================================================
    #[error("Tool not found: {provider}/{tool}")]
    ToolNotFound { provider: String, tool: String },

    #[error("Invalid arguments for tool '{tool}': {}", problems.join("; "))]
    InvalidArguments { tool: String, problems: Vec<String> },

    #[error("Tool '{tool}' call failed: {reason}")]
    ToolCall { tool: String, reason: String },

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_parse_error(path: &std::path::Path, line: Option<usize>, message: &str) -> String {
    match line {
        Some(line) => format!(
            "Failed to parse {} (line {}): {}",
            path.display(),
            line,
            message
        ),
        None => format!("Failed to parse {}: {}", path.display(), message),
    }
}

impl Error {
    /// Provider 획득 단계에서 발생한 에러인지 확인
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Error::ProviderLaunch { .. }
                | Error::ProviderHandshakeTimeout { .. }
                | Error::ProviderHandshakeProtocol { .. }
                | Error::ProviderExited { .. }
        )
    }

    /// 사용자 입력 문제인지 확인 (CLI exit code 2)
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::InvalidArguments { .. })
    }

    /// Provider launch 에러 생성 헬퍼
    pub fn launch(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ProviderLaunch {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Handshake protocol 에러 생성 헬퍼
    pub fn protocol(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ProviderHandshakeProtocol {
            provider: provider.into(),
            reason: reason.into(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
