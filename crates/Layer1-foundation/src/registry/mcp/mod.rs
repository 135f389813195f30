//! MCP 서버 (tool provider) 등록

mod server;

pub use server::{
    expand_env_var, ProviderSpec, ProvidersFile, DEFAULT_HANDSHAKE_TIMEOUT_SECS, PROVIDERS_DIR,
    PROVIDERS_FILE,
};
