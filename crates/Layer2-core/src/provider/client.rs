//! Provider Client - 캐시를 먼저 확인하는 provider 획득
//!
//! ## 흐름
//! 1. fingerprint = {name, command, args, version} 의 SHA-256
//! 2. provider 이름별 lock 안에서 캐시 조회
//! 3. hit → `ReadyFromCache` 핸들 (프로세스 없음)
//! 4. miss → 실행 + 핸드셰이크 → 캐시 저장 → `Ready` 핸들

use super::catalog::ToolCatalog;
use super::handle::{ProviderHandle, ProviderState};
use super::launch::ProviderContext;
use crate::mcp::McpTool;
use futures::future::join_all;
use gmp_foundation::{CacheStore, Namespace, ProviderSpec, Result, SecretProvider, Settings};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type LockMap = Arc<parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// Tool provider client
#[derive(Debug, Clone)]
pub struct ProviderClient {
    ctx: ProviderContext,
    /// provider 이름별 획득 lock
    locks: LockMap,
}

impl ProviderClient {
    /// 환경 변수 시크릿, 기본 타임아웃
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self {
            ctx: ProviderContext::new(cache),
            locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    /// 설정 파일 / 환경 변수의 핸드셰이크 타임아웃 적용
    pub fn from_settings(cache: Arc<CacheStore>, settings: &Settings) -> Self {
        Self::new(cache).with_handshake_timeout(settings.handshake_timeout())
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretProvider>) -> Self {
        self.ctx.secrets = secrets;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.ctx.handshake_timeout = timeout;
        self
    }

    /// 핸드셰이크 이후 요청(tools/call)의 타임아웃
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.ctx.request_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.ctx.cache
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.ctx.handshake_timeout
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    // ========================================================================
    // Acquisition
    // ========================================================================

    /// 도구 목록 획득
    ///
    /// 같은 이름의 획득은 직렬화된다. 먼저 끝난 쪽이 캐시를 쓰고,
    /// 나머지는 캐시 hit 로 끝난다.
    pub async fn acquire_tools(&self, spec: &ProviderSpec) -> Result<(ProviderHandle, Vec<McpTool>)> {
        let lock = self.lock_for(&spec.name);
        let _guard = lock.lock().await;

        let handle = ProviderHandle::new(spec.clone(), self.ctx.clone());
        handle.set_state(ProviderState::CheckingCache);

        let fingerprint = spec.fingerprint();
        if let Some(record) =
            self.ctx
                .cache
                .get_as(Namespace::Provider, &spec.name, Some(&fingerprint))
        {
            handle.restore(record);
            let tools = handle.tools();
            debug!(
                "Provider '{}' served from cache ({} tools, no launch)",
                spec.name,
                tools.len()
            );
            return Ok((handle, tools));
        }

        let (process, record) = self.ctx.launch(spec, handle.state_cell()).await?;
        self.ctx
            .cache
            .set(Namespace::Provider, &spec.name, &record, Some(&fingerprint));

        let tools = record.tools.clone();
        handle.attach(process, record).await;
        Ok((handle, tools))
    }

    /// 활성화된 provider 전부를 동시에 획득
    ///
    /// 하나가 실패해도 나머지는 계속된다. 실패는 catalog 에 기록된다.
    pub async fn acquire_all<'a, I>(&self, specs: I) -> ToolCatalog
    where
        I: IntoIterator<Item = &'a ProviderSpec>,
    {
        let pending = specs
            .into_iter()
            .filter(|spec| {
                if !spec.enabled {
                    debug!("Skipping disabled provider '{}'", spec.name);
                }
                spec.enabled
            })
            .map(|spec| async move { (spec.name.clone(), self.acquire_tools(spec).await) });

        let mut catalog = ToolCatalog::new();
        for (name, result) in join_all(pending).await {
            match result {
                Ok((handle, _)) => catalog.insert(handle),
                Err(e) => {
                    warn!("Provider '{}' unavailable: {}", name, e);
                    catalog.record_failure(name, e);
                }
            }
        }

        info!(
            "Loaded {} tools from {} provider(s), {} failed",
            catalog.len(),
            catalog.providers().count(),
            catalog.failures().len()
        );
        catalog
    }

    /// provider 캐시 엔트리 제거
    pub fn invalidate(&self, name: &str) -> Result<usize> {
        self.ctx.cache.invalidate(Some(Namespace::Provider), Some(name))
    }
}
