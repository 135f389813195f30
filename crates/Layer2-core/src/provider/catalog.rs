//! Tool catalog - 여러 provider 의 도구를 하나로 모은 목록
//!
//! 도구 이름은 `<provider>__<tool>` 형태로 노출된다.

use super::handle::ProviderHandle;
use crate::mcp::{McpTool, McpToolResult};
use gmp_foundation::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// provider 이름과 도구 이름 사이 구분자
pub const TOOL_NAME_SEPARATOR: &str = "__";

pub fn qualified_name(provider: &str, tool: &str) -> String {
    format!("{}{}{}", provider, TOOL_NAME_SEPARATOR, tool)
}

/// `memory__create_entities` → (`memory`, `create_entities`)
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once(TOOL_NAME_SEPARATOR)
        .filter(|(provider, tool)| !provider.is_empty() && !tool.is_empty())
}

/// 카탈로그 항목
#[derive(Debug, Clone)]
pub struct CatalogTool {
    pub qualified_name: String,
    pub provider: String,
    pub tool: McpTool,
}

/// 획득된 provider 들과 그 도구들
#[derive(Debug, Default)]
pub struct ToolCatalog {
    providers: BTreeMap<String, ProviderHandle>,
    tools: Vec<CatalogTool>,
    failures: BTreeMap<String, Error>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 핸들 추가 (같은 이름이 있으면 교체)
    pub fn insert(&mut self, handle: ProviderHandle) {
        let provider = handle.name().to_string();
        self.tools.retain(|t| t.provider != provider);
        self.failures.remove(&provider);

        for tool in handle.tools() {
            self.tools.push(CatalogTool {
                qualified_name: qualified_name(&provider, &tool.name),
                provider: provider.clone(),
                tool,
            });
        }
        self.providers.insert(provider, handle);
    }

    pub fn record_failure(&mut self, provider: impl Into<String>, error: Error) {
        self.failures.insert(provider.into(), error);
    }

    pub fn tools(&self) -> &[CatalogTool] {
        &self.tools
    }

    pub fn get(&self, qualified: &str) -> Option<&CatalogTool> {
        self.tools.iter().find(|t| t.qualified_name == qualified)
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderHandle> {
        self.providers.get(name)
    }

    pub fn providers(&self) -> impl Iterator<Item = &ProviderHandle> {
        self.providers.values()
    }

    pub fn failures(&self) -> &BTreeMap<String, Error> {
        &self.failures
    }

    /// 도구 수
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `<provider>__<tool>` 이름으로 호출
    pub async fn call(&self, qualified: &str, arguments: Value) -> Result<McpToolResult> {
        let entry = self.get(qualified).ok_or_else(|| {
            let (provider, tool) = split_qualified(qualified).unwrap_or(("", qualified));
            Error::ToolNotFound {
                provider: provider.to_string(),
                tool: tool.to_string(),
            }
        })?;

        let handle = self.providers.get(&entry.provider).ok_or_else(|| {
            Error::Internal(format!("catalog has no handle for provider '{}'", entry.provider))
        })?;
        handle.call_tool(&entry.tool.name, arguments).await
    }

    /// 모든 프로세스 종료
    pub async fn stop_all(&self) {
        for handle in self.providers.values() {
            if let Err(e) = handle.stop().await {
                warn!("Error stopping provider '{}': {}", handle.name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_names() {
        assert_eq!(qualified_name("memory", "create_entities"), "memory__create_entities");
        assert_eq!(
            split_qualified("memory__create_entities"),
            Some(("memory", "create_entities"))
        );
        assert_eq!(split_qualified("brave-search__web__search"), Some(("brave-search", "web__search")));
        assert_eq!(split_qualified("plain"), None);
        assert_eq!(split_qualified("__tool"), None);
    }

    #[tokio::test]
    async fn test_unknown_tool_call() {
        let catalog = ToolCatalog::new();
        match catalog.call("memory__missing", Value::Null).await {
            Err(Error::ToolNotFound { provider, tool }) => {
                assert_eq!(provider, "memory");
                assert_eq!(tool, "missing");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(catalog.is_empty());
    }
}
