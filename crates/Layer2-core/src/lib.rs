//! gmp-core: Core Runtime for the Gradio MCP playground
//!
//! Layer2 - 설정 로더와 tool provider 클라이언트
//!
//! # 주요 모듈
//!
//! - `config`: YAML / JSON / TOML 설정 문서 (캐시 memoize), 프롬프트 카탈로그
//! - `mcp`: MCP stdio transport, 핸드셰이크, 도구 인자 검증
//! - `provider`: 캐시 우선 provider 획득, 지연 실행, 도구 카탈로그
//!
//! # 사용 예시
//!
//! ```ignore
//! use gmp_core::{ConfigLoader, ProviderClient};
//! use gmp_foundation::{CacheStore, Settings};
//!
//! let settings = Settings::load()?;
//! let cache = Arc::new(CacheStore::open(settings.cache_config()));
//!
//! // 설정 파일 (변경되지 않았으면 캐시에서)
//! let loader = ConfigLoader::new(cache.clone());
//! let providers = loader.load_providers(&path)?;
//!
//! // provider 도구 (캐시 hit 이면 프로세스를 띄우지 않음)
//! let client = ProviderClient::from_settings(cache, &settings);
//! let catalog = client.acquire_all(providers.enabled()).await;
//! for tool in catalog.tools() {
//!     println!("{}", tool.qualified_name);
//! }
//! ```

// Core modules
pub mod config;
pub mod mcp;
pub mod provider;

// Re-exports: Config
pub use config::{ConfigLoader, Document, DocumentFormat, PromptCatalog};

// Re-exports: MCP
pub use mcp::{
    validate_arguments, McpContent, McpSession, McpTool, McpToolResult, McpTransport, ServerInfo,
    StdioTransport, MCP_PROTOCOL_VERSION,
};

// Re-exports: Provider
pub use provider::{
    qualified_name, split_qualified, CatalogTool, ProviderClient, ProviderHandle, ProviderRecord,
    ProviderState, ToolCatalog,
};

// Layer1 re-exports
pub use gmp_foundation::{Error, Result};

/// Layer2 버전
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
