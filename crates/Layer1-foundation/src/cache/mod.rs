//! # Disk Cache
//!
//! 프로바이더 툴 목록과 파싱된 설정 문서를 디스크에 보관하는 캐시 계층.
//! 캐시는 최적화일 뿐이며, 캐시 실패가 호출자의 실패가 되어서는 안 된다.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  ConfigLoader (gmp-core)      ProviderClient (gmp-core)   │
//! │        │  fingerprint = content     │  fingerprint = spec  │
//! │        ▼                            ▼                     │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ CacheStore                                          │  │
//! │  │  get / set / invalidate / prune_expired / stats     │  │
//! │  │  ├── redact   (secret keys never reach disk)        │  │
//! │  │  └── hash     (sha256 file names, fingerprints)     │  │
//! │  └────────────────────────────────────────────────────┘  │
//! │        │                                                  │
//! │        ▼                                                  │
//! │  <cache dir>/gradio-mcp-playground/{servers,configs,models}│
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - 캐시 설정 (루트, TTL, 비활성화 스위치)
//! - [`entry`] - 네임스페이스 / 엔트리 타입
//! - [`store`] - 디스크 저장소
//! - [`redact`] - 시크릿 제거
//! - [`util`] - 해시 유틸리티

pub mod config;
pub mod entry;
pub mod redact;
pub mod store;
pub mod util;

pub use config::{
    default_cache_dir, disabled_by_env, CacheConfig, CACHE_DIR_NAME, DISABLE_CACHE_ENV,
    DISABLE_CACHE_ENV_ALIAS,
};
pub use entry::{CacheEntry, Namespace};
pub use redact::{contains_secrets, is_secret_key, redact, redact_in_place, REDACTED};
pub use store::{CacheStats, CacheStore, NamespaceStats};
pub use util::{canonical_json, fingerprint_file, fingerprint_json, sha256_hex, short_hash};
