//! Registry - tool provider 등록/관리
//!
//! - `mcp/` - MCP 서버 실행 설정과 providers 파일 (mcpServers)

pub mod mcp;

// MCP
pub use mcp::{
    expand_env_var, ProviderSpec, ProvidersFile, DEFAULT_HANDSHAKE_TIMEOUT_SECS, PROVIDERS_DIR,
    PROVIDERS_FILE,
};
