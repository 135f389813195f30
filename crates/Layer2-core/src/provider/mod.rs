//! Tool Provider System
//!
//! 외부 MCP 서버 프로세스를 도구 provider 로 다룬다.
//!
//! # 구조
//!
//! - `ProviderClient`: 캐시 확인 → 실행 → 핸드셰이크 → 캐시 저장
//! - `ProviderHandle`: provider 하나의 도구 목록과 프로세스
//! - `ToolCatalog`: 여러 provider 의 도구를 `<provider>__<tool>` 이름으로 모음
//!
//! ```rust,ignore
//! let cache = Arc::new(CacheStore::open(settings.cache_config()));
//! let client = ProviderClient::from_settings(cache, &settings);
//!
//! let catalog = client.acquire_all(providers.enabled()).await;
//! let result = catalog.call("memory__read_graph", json!({})).await?;
//! catalog.stop_all().await;
//! ```

mod catalog;
mod client;
mod handle;
mod launch;

pub use catalog::{qualified_name, split_qualified, CatalogTool, ToolCatalog, TOOL_NAME_SEPARATOR};
pub use client::ProviderClient;
pub use handle::{ProviderHandle, ProviderRecord, ProviderState};
