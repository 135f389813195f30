//! MCP - Model Context Protocol 연동
//!
//! 외부 MCP 서버(tool provider)와 stdio로 통신합니다.
//!
//! ## 기능
//! - 프로세스 실행 / 종료 감시 (transport)
//! - initialize → tools/list 핸드셰이크 (client)
//! - 도구 인자 검증 (schema)
//!
//! ## 참고
//! - https://modelcontextprotocol.io/

mod client;
pub mod schema;
mod transport;
mod types;

pub use client::McpSession;
pub use schema::validate_arguments;
pub use transport::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, McpTransport,
    ProcessExit, StdioTransport, DEFAULT_REQUEST_TIMEOUT,
};
pub use types::{
    InitializeResult, McpContent, McpTool, McpToolResult, ServerInfo, MCP_PROTOCOL_VERSION,
};
