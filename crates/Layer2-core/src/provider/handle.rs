//! Provider handle
//!
//! 한 provider 의 도구 목록과 (있다면) 실행 중인 프로세스를 소유한다.
//!
//! ```text
//! Idle → CheckingCache ─┬─→ ReadyFromCache ──(첫 호출)──┐
//!                       └─→ Launching → Handshaking → Ready → Stopped
//!                                            │          │
//!                                            └──────────┴─→ Failed
//! ```

use super::launch::{LiveProcess, ProviderContext};
use crate::mcp::{validate_arguments, McpSession, McpTool, McpToolResult, ServerInfo, StdioTransport};
use gmp_foundation::{Error, Namespace, ProviderSpec, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) type StateCell = Arc<Mutex<ProviderState>>;

// ============================================================================
// ProviderState
// ============================================================================

/// Provider 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Idle,
    CheckingCache,
    /// 캐시에서 도구 목록을 얻음, 프로세스 없음
    ReadyFromCache,
    Launching,
    Handshaking,
    Ready,
    Stopped,
    Failed,
}

impl ProviderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderState::Idle => "idle",
            ProviderState::CheckingCache => "checking_cache",
            ProviderState::ReadyFromCache => "ready_from_cache",
            ProviderState::Launching => "launching",
            ProviderState::Handshaking => "handshaking",
            ProviderState::Ready => "ready",
            ProviderState::Stopped => "stopped",
            ProviderState::Failed => "failed",
        }
    }

    /// 도구 호출이 가능한 상태
    pub fn is_usable(&self) -> bool {
        matches!(self, ProviderState::Ready | ProviderState::ReadyFromCache)
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ProviderRecord - 캐시 payload
// ============================================================================

/// `servers/` 네임스페이스에 저장되는 핸드셰이크 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub tools: Vec<McpTool>,
    #[serde(default)]
    pub server: Option<ServerInfo>,
    #[serde(default)]
    pub protocol_version: Option<String>,
}

// ============================================================================
// ProviderHandle
// ============================================================================

/// 도구 provider 핸들
///
/// 프로세스는 핸들이 독점한다. 핸들을 drop 하면 프로세스도 종료된다.
pub struct ProviderHandle {
    spec: ProviderSpec,
    ctx: ProviderContext,
    tools: RwLock<Vec<McpTool>>,
    state: StateCell,
    live: tokio::sync::Mutex<Option<LiveProcess>>,
}

impl ProviderHandle {
    pub(crate) fn new(spec: ProviderSpec, ctx: ProviderContext) -> Self {
        Self {
            spec,
            ctx,
            tools: RwLock::new(Vec::new()),
            state: Arc::new(Mutex::new(ProviderState::Idle)),
            live: tokio::sync::Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    /// 도구 목록 (선언 순서 유지)
    pub fn tools(&self) -> Vec<McpTool> {
        self.tools.read().clone()
    }

    pub fn tool(&self, name: &str) -> Option<McpTool> {
        self.tools.read().iter().find(|t| t.name == name).cloned()
    }

    pub fn state(&self) -> ProviderState {
        *self.state.lock()
    }

    /// 프로세스가 떠 있고 핸드셰이크가 끝난 상태
    pub fn is_running(&self) -> bool {
        self.state() == ProviderState::Ready
    }

    pub(crate) fn state_cell(&self) -> &StateCell {
        &self.state
    }

    pub(crate) fn set_state(&self, state: ProviderState) {
        *self.state.lock() = state;
    }

    /// 캐시에서 복원
    pub(crate) fn restore(&self, record: ProviderRecord) {
        *self.tools.write() = record.tools;
        self.set_state(ProviderState::ReadyFromCache);
    }

    /// 실행된 프로세스 연결
    pub(crate) async fn attach(&self, process: LiveProcess, record: ProviderRecord) {
        self.watch_exit(&process.transport);
        *self.tools.write() = record.tools;
        *self.live.lock().await = Some(process);
        self.set_state(ProviderState::Ready);
    }

    // ========================================================================
    // Tool call
    // ========================================================================

    /// 도구 호출
    ///
    /// 인자는 도구 스키마로 먼저 검증된다. 캐시에서 만든 핸들이면
    /// 이 시점에 프로세스를 띄운다.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        let tool = self.tool(name).ok_or_else(|| Error::ToolNotFound {
            provider: self.spec.name.clone(),
            tool: name.to_string(),
        })?;

        validate_arguments(name, &tool.input_schema, &arguments)?;
        let arguments = if arguments.is_null() { json!({}) } else { arguments };

        let session = self.session().await?;
        session.call_tool(name, arguments).await
    }

    async fn session(&self) -> Result<Arc<McpSession>> {
        let mut live = self.live.lock().await;

        if let Some(process) = live.as_ref() {
            if process.session.is_connected() {
                return Ok(Arc::clone(&process.session));
            }
        }

        match self.state() {
            ProviderState::ReadyFromCache => {
                debug!("Lazily launching provider '{}'", self.spec.name);
                let (process, record) = self.ctx.launch(&self.spec, &self.state).await?;

                // 서버가 바뀌었을 수 있으므로 새 목록으로 갱신
                let fingerprint = self.spec.fingerprint();
                self.ctx
                    .cache
                    .set(Namespace::Provider, &self.spec.name, &record, Some(&fingerprint));

                self.watch_exit(&process.transport);
                *self.tools.write() = record.tools;
                let session = Arc::clone(&process.session);
                *live = Some(process);
                self.set_state(ProviderState::Ready);
                Ok(session)
            }
            ProviderState::Stopped => Err(Error::ProviderStopped(self.spec.name.clone())),
            _ => Err(Error::ProviderExited {
                provider: self.spec.name.clone(),
            }),
        }
    }

    /// 프로세스 종료 감시
    ///
    /// `stop()`이 아닌 종료는 `Failed` + 캐시 무효화.
    fn watch_exit(&self, transport: &StdioTransport) {
        let mut exit_rx = transport.exit_watch();
        let state = Arc::clone(&self.state);
        let cache = Arc::clone(&self.ctx.cache);
        let name = self.spec.name.clone();

        tokio::spawn(async move {
            let exit = match exit_rx.wait_for(|exit| exit.is_some()).await {
                Ok(exit) => *exit,
                Err(_) => return,
            };

            if let Some(exit) = exit {
                if exit.requested {
                    return;
                }
                warn!(
                    "Provider '{}' exited unexpectedly (code {:?}); invalidating cached tools",
                    name, exit.code
                );
                *state.lock() = ProviderState::Failed;
                cache.invalidate_quietly(Namespace::Provider, &name);
            }
        });
    }

    // ========================================================================
    // Stop
    // ========================================================================

    /// 프로세스 종료 (여러 번 호출해도 됨)
    pub async fn stop(&self) -> Result<()> {
        self.set_state(ProviderState::Stopped);

        let process = self.live.lock().await.take();
        if let Some(process) = process {
            debug!("Stopping provider '{}'", self.spec.name);
            process.session.close().await?;
        }
        Ok(())
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("name", &self.spec.name)
            .field("state", &self.state())
            .field("tools", &self.tools.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmp_foundation::{CacheConfig, CacheStore};
    use tempfile::TempDir;

    fn handle(dir: &TempDir) -> ProviderHandle {
        let ctx = ProviderContext::new(Arc::new(CacheStore::open(CacheConfig::at(dir.path()))));
        let spec = ProviderSpec::new("memory", "definitely-not-a-real-binary-gmp");
        ProviderHandle::new(spec, ctx)
    }

    fn record() -> ProviderRecord {
        ProviderRecord {
            tools: vec![McpTool::new(
                "echo",
                "Echo text",
                json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]}),
            )],
            server: None,
            protocol_version: None,
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ProviderState::ReadyFromCache.to_string(), "ready_from_cache");
        assert!(ProviderState::Ready.is_usable());
        assert!(!ProviderState::Failed.is_usable());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);
        handle.restore(record());

        let err = handle.call_tool("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
        assert_eq!(handle.state(), ProviderState::ReadyFromCache);
    }

    #[tokio::test]
    async fn test_invalid_arguments_do_not_launch() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);
        handle.restore(record());

        let err = handle.call_tool("echo", json!({"text": 5})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
        assert_eq!(handle.state(), ProviderState::ReadyFromCache);
    }

    #[tokio::test]
    async fn test_lazy_launch_failure_marks_failed() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);
        handle.restore(record());

        let err = handle.call_tool("echo", json!({"text": "hi"})).await.unwrap_err();
        assert!(matches!(err, Error::ProviderLaunch { .. }));
        assert_eq!(handle.state(), ProviderState::Failed);
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_stopped_handle_rejects_calls() {
        let dir = TempDir::new().unwrap();
        let handle = handle(&dir);
        handle.restore(record());

        handle.stop().await.unwrap();
        handle.stop().await.unwrap();

        let err = handle.call_tool("echo", json!({"text": "hi"})).await.unwrap_err();
        assert!(matches!(err, Error::ProviderStopped(_)));
    }

    #[test]
    fn test_record_survives_redaction() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(CacheConfig::at(dir.path()));
        let record = ProviderRecord {
            tools: vec![McpTool::new(
                "login",
                "Log in",
                json!({"type": "object", "properties": {"api_key": {"type": "string"}}}),
            )],
            server: Some(ServerInfo {
                name: "auth".to_string(),
                version: "1.0".to_string(),
            }),
            protocol_version: Some("2024-11-05".to_string()),
        };

        cache.set(Namespace::Provider, "auth", &record, Some("fp"));
        let cached: ProviderRecord = cache.get_as(Namespace::Provider, "auth", Some("fp")).unwrap();
        assert_eq!(cached, record);
    }
}
