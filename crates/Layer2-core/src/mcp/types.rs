//! MCP Types - MCP 관련 타입 정의

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// MCP 프로토콜 버전
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP 서버에서 제공하는 도구 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    /// 도구 이름
    pub name: String,

    /// 도구 설명
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// 입력 스키마 (JSON Schema)
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    json!({ "type": "object" })
}

impl McpTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }
}

/// MCP 도구 실행 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolResult {
    /// 오류 여부
    #[serde(default, rename = "isError", alias = "is_error")]
    pub is_error: bool,

    /// 결과 콘텐츠
    #[serde(default)]
    pub content: Vec<McpContent>,
}

/// MCP 콘텐츠
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    /// 텍스트 콘텐츠
    Text { text: String },

    /// 이미지 콘텐츠
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    /// 임베디드 리소스
    Resource { resource: Value },

    /// 알 수 없는 타입 (audio 등)
    #[serde(other)]
    Unsupported,
}

impl McpToolResult {
    /// 성공 결과 생성
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            is_error: false,
            content: vec![McpContent::Text { text: text.into() }],
        }
    }

    /// 오류 결과 생성
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            content: vec![McpContent::Text { text: text.into() }],
        }
    }

    /// 텍스트 결과 추출
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|content| match content {
            McpContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// MCP 서버 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Initialize 응답
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
    #[serde(default)]
    pub capabilities: Value,
}

/// tools/list 응답
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolsListResult {
    pub tools: Vec<McpTool>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_tool_result() {
        let result = McpToolResult::success("Hello");
        assert!(!result.is_error);
        assert_eq!(result.text(), Some("Hello"));

        let error = McpToolResult::error("Failed");
        assert!(error.is_error);
    }

    #[test]
    fn test_tool_result_wire_format() {
        let result: McpToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "audio", "data": "...", "mimeType": "audio/wav"},
                {"type": "text", "text": "done"}
            ],
            "isError": true
        }))
        .unwrap();

        assert!(result.is_error);
        assert_eq!(result.text(), Some("done"));
        assert!(matches!(result.content[0], McpContent::Unsupported));
    }

    #[test]
    fn test_tool_without_schema() {
        let tool: McpTool = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(tool.input_schema, json!({"type": "object"}));
        assert!(tool.description.is_none());
    }

    #[test]
    fn test_initialize_result() {
        let init: InitializeResult = serde_json::from_value(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "serverInfo": {"name": "memory", "version": "0.6.0"},
            "capabilities": {"tools": {}}
        }))
        .unwrap();

        assert_eq!(init.protocol_version, "2024-11-05");
        assert_eq!(init.server_info.unwrap().name, "memory");
    }
}
