//! MCP Client - MCP 서버 세션
//!
//! initialize → notifications/initialized → tools/list 핸드셰이크와
//! tools/call 을 처리한다. 프로세스 관리는 transport 쪽 책임.

use super::transport::McpTransport;
use super::types::{InitializeResult, McpTool, McpToolResult, ToolsListResult, MCP_PROTOCOL_VERSION};
use gmp_foundation::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// 한 번의 tools/list에서 따라갈 최대 페이지 수
const MAX_TOOL_PAGES: usize = 64;

/// MCP 클라이언트 정보
#[derive(Debug, Clone, Serialize)]
struct ClientInfo {
    name: String,
    version: String,
}

/// MCP 세션
pub struct McpSession {
    /// provider 이름
    provider: String,

    /// 전송 계층
    transport: Arc<dyn McpTransport>,
}

impl McpSession {
    pub fn new(provider: impl Into<String>, transport: Arc<dyn McpTransport>) -> Self {
        Self {
            provider: provider.into(),
            transport,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// 전체 핸드셰이크
    ///
    /// 실패는 `ProviderHandshakeProtocol`, `ProviderExited`,
    /// `RequestTimeout` 중 하나로 보고된다.
    pub async fn handshake(&self) -> Result<(InitializeResult, Vec<McpTool>)> {
        let init = self.initialize().await?;
        let tools = self.list_tools().await?;
        Ok((init, tools))
    }

    /// MCP initialize 핸드셰이크
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "clientInfo": ClientInfo {
                name: "gradio-mcp-playground".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            "capabilities": {}
        });

        let result = self
            .transport
            .request("initialize", Some(params))
            .await
            .map_err(|e| self.protocol_error("initialize", e))?;

        // 응답 파싱
        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            Error::protocol(&self.provider, format!("invalid initialize response: {}", e))
        })?;

        if init.protocol_version != MCP_PROTOCOL_VERSION {
            debug!(
                "Provider '{}' negotiated protocol {} (requested {})",
                self.provider, init.protocol_version, MCP_PROTOCOL_VERSION
            );
        }
        if let Some(info) = &init.server_info {
            debug!(
                "MCP server '{}' v{} initialized for provider '{}'",
                info.name, info.version, self.provider
            );
        }

        // initialized 알림 전송
        self.transport
            .notify("notifications/initialized", None)
            .await?;

        Ok(init)
    }

    /// 도구 목록 (페이지네이션 포함)
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let result = self
                .transport
                .request("tools/list", params)
                .await
                .map_err(|e| self.protocol_error("tools/list", e))?;

            let page: ToolsListResult = serde_json::from_value(result).map_err(|e| {
                Error::protocol(&self.provider, format!("invalid tools/list response: {}", e))
            })?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => {
                    debug!("Listed {} tools from provider '{}'", tools.len(), self.provider);
                    return Ok(tools);
                }
            }
        }

        Err(Error::protocol(
            &self.provider,
            format!("tools/list did not finish after {} pages", MAX_TOOL_PAGES),
        ))
    }

    /// 도구 호출
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        debug!("Calling MCP tool: {}/{}", self.provider, name);

        let params = json!({
            "name": name,
            "arguments": arguments
        });

        let result = self
            .transport
            .request("tools/call", Some(params))
            .await
            .map_err(|e| match e {
                Error::Rpc { code, message, .. } => Error::ToolCall {
                    tool: name.to_string(),
                    reason: format!("JSON-RPC error {}: {}", code, message),
                },
                // 핸드셰이크 이후의 stdout 단절은 호출 실패
                Error::ProviderHandshakeProtocol { reason, .. } => Error::ToolCall {
                    tool: name.to_string(),
                    reason,
                },
                other => other,
            })?;

        // 결과 파싱
        let tool_result: McpToolResult =
            serde_json::from_value(result).map_err(|e| Error::ToolCall {
                tool: name.to_string(),
                reason: format!("invalid tools/call response: {}", e),
            })?;

        if tool_result.is_error {
            warn!(
                "MCP tool '{}/{}' returned error: {:?}",
                self.provider,
                name,
                tool_result.text()
            );
        }

        Ok(tool_result)
    }

    /// 연결 종료
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await
    }

    /// JSON-RPC 에러 응답은 프로토콜 위반으로 본다
    fn protocol_error(&self, method: &str, error: Error) -> Error {
        match error {
            Error::Rpc { code, message, .. } => Error::protocol(
                &self.provider,
                format!("{} failed with JSON-RPC error {}: {}", method, code, message),
            ),
            other => other,
        }
    }
}
