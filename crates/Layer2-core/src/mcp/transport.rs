//! MCP Transport - 전송 계층 구현
//!
//! MCP 서버와의 통신을 위한 전송 계층
//! - Stdio: 로컬 프로세스와 stdin/stdout 통신 (줄 단위 JSON-RPC 2.0)
//!
//! 프로세스는 transport가 단독 소유한다. transport가 drop되면
//! 모니터 태스크가 프로세스를 종료시킨다.

use async_trait::async_trait;
use gmp_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch, RwLock};
use tracing::{debug, info, warn};

/// 요청 기본 타임아웃
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// stdout EOF 이후 프로세스 종료를 기다리는 시간
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// JSON-RPC 2.0 요청
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 에러
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn method_not_found() -> Self {
        Self {
            code: -32601,
            message: "Method not found".to_string(),
            data: None,
        }
    }
}

/// JSON-RPC 알림 (응답 없음)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// 프로세스 종료 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// 종료 코드 (시그널로 종료되면 None)
    pub code: Option<i32>,
    /// `close()` 또는 drop으로 요청된 종료인지
    pub requested: bool,
}

/// MCP Transport trait
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// 요청 전송 및 응답 수신
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value>;

    /// 알림 전송 (응답 없음)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// 연결 종료
    async fn close(&self) -> Result<()>;

    /// 연결 상태 확인
    fn is_connected(&self) -> bool;
}

type PendingMap = Arc<RwLock<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Stdio Transport - 프로세스 기반 통신
pub struct StdioTransport {
    /// provider 이름 (에러 메시지용)
    provider: String,

    /// 요청 ID 카운터
    request_id: AtomicU64,

    /// stdin writer
    stdin_tx: mpsc::Sender<String>,

    /// 대기 중인 요청들 (id -> response sender)
    pending_requests: PendingMap,

    /// 연결 상태
    connected: Arc<AtomicBool>,

    /// 종료 요청 여부
    stop_requested: Arc<AtomicBool>,

    /// 모니터 태스크에 종료 요청
    kill_tx: parking_lot::Mutex<Option<oneshot::Sender<()>>>,

    /// 종료 알림
    exit_rx: watch::Receiver<Option<ProcessExit>>,

    /// 요청 타임아웃
    request_timeout: Duration,

    pid: Option<u32>,
}

impl StdioTransport {
    /// 프로세스 시작
    ///
    /// stdio는 모두 파이프로 연결되며 `kill_on_drop`이 설정된다.
    pub async fn spawn(provider: &str, mut cmd: Command) -> Result<Self> {
        info!("Spawning MCP process for '{}'", provider);

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::launch(provider, format!("failed to spawn process: {}", e)))?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::launch(provider, "failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::launch(provider, "failed to capture stdout"))?;
        let stderr = child.stderr.take();

        // 요청 전송용 채널
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(32);

        // 대기 중인 요청
        let pending_requests: PendingMap = Arc::new(RwLock::new(HashMap::new()));
        let pending_for_reader = Arc::clone(&pending_requests);

        let connected = Arc::new(AtomicBool::new(true));
        let connected_for_writer = Arc::clone(&connected);
        let connected_for_reader = Arc::clone(&connected);
        let connected_for_monitor = Arc::clone(&connected);

        // stdin writer task
        let mut stdin_writer = stdin;
        tokio::spawn(async move {
            while let Some(msg) = stdin_rx.recv().await {
                if let Err(e) = stdin_writer.write_all(msg.as_bytes()).await {
                    debug!("Failed to write to stdin: {}", e);
                    connected_for_writer.store(false, Ordering::SeqCst);
                    break;
                }
                if let Err(e) = stdin_writer.flush().await {
                    debug!("Failed to flush stdin: {}", e);
                    connected_for_writer.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });

        // stdout reader task
        let mut reader = BufReader::new(stdout).lines();
        let name = provider.to_string();
        tokio::spawn(async move {
            while let Ok(Some(line)) = reader.next_line().await {
                debug!("MCP stdout [{}]: {}", name, line);
                dispatch_line(&line, &pending_for_reader).await;
            }
            connected_for_reader.store(false, Ordering::SeqCst);

            // 응답을 기다리는 요청들을 깨운다
            pending_for_reader.write().await.clear();
            debug!("MCP stdout reader finished for '{}'", name);
        });

        // stderr drain task (파이프가 가득 차면 서버가 멈춘다)
        if let Some(stderr) = stderr {
            let name = provider.to_string();
            let mut lines = BufReader::new(stderr).lines();
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("MCP stderr [{}]: {}", name, line);
                }
            });
        }

        // exit monitor task
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let (exit_tx, exit_rx) = watch::channel::<Option<ProcessExit>>(None);
        let stop_requested = Arc::new(AtomicBool::new(false));
        let stop_for_monitor = Arc::clone(&stop_requested);
        let name = provider.to_string();
        tokio::spawn(async move {
            let natural = tokio::select! {
                status = child.wait() => Some(status),
                // close() 요청 또는 transport drop
                _ = kill_rx => None,
            };

            let (status, requested) = match natural {
                Some(status) => (status, stop_for_monitor.load(Ordering::SeqCst)),
                None => {
                    if let Err(e) = child.start_kill() {
                        debug!("Failed to kill MCP process '{}': {}", name, e);
                    }
                    (child.wait().await, true)
                }
            };

            connected_for_monitor.store(false, Ordering::SeqCst);
            let exit = ProcessExit {
                code: status.ok().and_then(|s| s.code()),
                requested,
            };
            if requested {
                debug!("MCP process '{}' stopped", name);
            } else {
                warn!("MCP process '{}' exited unexpectedly (code {:?})", name, exit.code);
            }
            let _ = exit_tx.send(Some(exit));
        });

        Ok(Self {
            provider: provider.to_string(),
            request_id: AtomicU64::new(1),
            stdin_tx,
            pending_requests,
            connected,
            stop_requested,
            kill_tx: parking_lot::Mutex::new(Some(kill_tx)),
            exit_rx,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pid,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// 종료 알림 구독
    pub fn exit_watch(&self) -> watch::Receiver<Option<ProcessExit>> {
        self.exit_rx.clone()
    }

    /// 이미 종료되었다면 종료 정보
    pub fn exit_status(&self) -> Option<ProcessExit> {
        *self.exit_rx.borrow()
    }

    /// 다음 요청 ID 생성
    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn exited(&self) -> Error {
        Error::ProviderExited {
            provider: self.provider.clone(),
        }
    }

    /// 응답 경로가 끊겼을 때의 에러
    ///
    /// 모니터가 종료를 확인하면 `ProviderExited`, 프로세스가 살아 있는데
    /// stdout만 닫혔으면 프로토콜 에러.
    async fn disconnected(&self) -> Error {
        let mut exit_rx = self.exit_rx.clone();
        let exited = tokio::time::timeout(EXIT_GRACE, exit_rx.wait_for(|exit| exit.is_some()))
            .await
            .is_ok();
        if exited {
            return self.exited();
        }

        warn!("MCP process '{}' closed stdout but is still running", self.provider);
        Error::protocol(&self.provider, "stdout closed while the process is still running")
    }
}

/// stdout 한 줄 처리
async fn dispatch_line(line: &str, pending: &PendingMap) {
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            debug!("Non-JSON-RPC line or parse error: {}", e);
            return;
        }
    };

    // 서버 -> 클라이언트 요청/알림은 응답이 아니다
    if value.get("method").is_some() {
        debug!("Ignoring server-initiated message: {}", line);
        return;
    }

    match serde_json::from_value::<JsonRpcResponse>(value) {
        Ok(response) => {
            if let Some(id) = response.id {
                if let Some(sender) = pending.write().await.remove(&id) {
                    let _ = sender.send(response);
                }
            }
        }
        Err(e) => debug!("Malformed JSON-RPC response: {}", e),
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        if !self.is_connected() {
            return Err(self.disconnected().await);
        }

        let id = self.next_id();
        let request = JsonRpcRequest::new(id, method, params);

        // 응답 수신 채널 생성
        let (tx, rx) = oneshot::channel();
        self.pending_requests.write().await.insert(id, tx);

        // reader가 방금 종료했다면 등록한 sender는 아무도 깨우지 않는다
        if !self.is_connected() {
            self.pending_requests.write().await.remove(&id);
            return Err(self.disconnected().await);
        }

        // 요청 전송
        let msg = serde_json::to_string(&request)?;
        debug!("Sending MCP request: {}", msg);

        if self.stdin_tx.send(format!("{}\n", msg)).await.is_err() {
            self.pending_requests.write().await.remove(&id);
            return Err(self.disconnected().await);
        }

        // 응답 대기
        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(self.disconnected().await),
            Err(_) => {
                self.pending_requests.write().await.remove(&id);
                return Err(Error::RequestTimeout {
                    provider: self.provider.clone(),
                    method: method.to_string(),
                    timeout: self.request_timeout,
                });
            }
        };

        // 에러 확인
        if let Some(error) = response.error {
            return Err(Error::Rpc {
                provider: self.provider.clone(),
                code: i64::from(error.code),
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(self.exited());
        }

        let notification = JsonRpcNotification::new(method, params);
        let msg = serde_json::to_string(&notification)?;

        self.stdin_tx
            .send(format!("{}\n", msg))
            .await
            .map_err(|_| self.exited())
    }

    /// 프로세스를 종료하고 종료될 때까지 기다린다
    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.stop_requested.store(true, Ordering::SeqCst);

        if let Some(kill_tx) = self.kill_tx.lock().take() {
            let _ = kill_tx.send(());
        }

        let mut exit_rx = self.exit_rx.clone();
        let _ = exit_rx.wait_for(|exit| exit.is_some()).await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("provider", &self.provider)
            .field("pid", &self.pid)
            .field("connected", &self.is_connected())
            .finish()
    }
}
