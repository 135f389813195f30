//! Config - 전역 설정 관리
//!
//! - `settings.rs` - 캐시 / provider 설정 (settings.toml + 환경 변수)

mod settings;

pub use settings::{
    line_at, CacheSettings, ProviderSettings, Settings, APP_DIR_NAME, ENV_CACHE_DIR,
    ENV_CACHE_TTL_SECS, ENV_HANDSHAKE_TIMEOUT_SECS, ENV_SERVERS_FILE, SETTINGS_FILE,
};
