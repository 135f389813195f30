//! # gmp-foundation
//!
//! Foundation layer for the Gradio MCP playground:
//! - Error: 공통 에러 타입
//! - Cache: 네임스페이스 / TTL / 시크릿 제거가 적용된 디스크 캐시
//! - Config: 전역 설정 (settings.toml + 환경 변수)
//! - Registry: MCP 서버 실행 설정 (mcpServers 파일)
//! - Secret: 실행 시점 시크릿 주입
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  gmp (CLI)                                              │
//! │                     │                                   │
//! │                     ▼                                   │
//! │  gmp-core: ConfigLoader, ProviderClient                  │
//! │          ┌─────────┴─────────┐                         │
//! │          ▼                   ▼                         │
//! │     CacheStore         ProviderSpec + SecretProvider    │
//! │   (servers/configs)    (stdio launch)                   │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod registry;
pub mod secret;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Cache (디스크 캐시)
// ============================================================================
pub use cache::{
    // Config
    default_cache_dir,
    disabled_by_env,
    CacheConfig,
    CACHE_DIR_NAME,
    DISABLE_CACHE_ENV,
    DISABLE_CACHE_ENV_ALIAS,
    // Entry
    CacheEntry,
    Namespace,
    // Store
    CacheStats,
    CacheStore,
    NamespaceStats,
    // Redaction
    contains_secrets,
    is_secret_key,
    redact,
    REDACTED,
    // Hashing
    canonical_json,
    fingerprint_file,
    fingerprint_json,
    short_hash,
};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{line_at, CacheSettings, ProviderSettings, Settings, SETTINGS_FILE};

// ============================================================================
// Registry (레지스트리)
// ============================================================================
pub use registry::{
    expand_env_var, ProviderSpec, ProvidersFile, DEFAULT_HANDSHAKE_TIMEOUT_SECS, PROVIDERS_FILE,
};

// ============================================================================
// Secret (시크릿)
// ============================================================================
pub use secret::{Credential, EnvSecrets, NoSecrets, SecretProvider, StaticSecrets};
