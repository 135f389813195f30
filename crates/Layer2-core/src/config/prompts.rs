//! Prompt catalog
//!
//! 설정 디렉토리의 YAML 문서들에서 시스템 프롬프트, 모델 설정,
//! 서버별 안내 문구를 찾는다. 모든 파일은 `ConfigLoader`를 거치므로
//! 변경되지 않은 파일은 다시 파싱하지 않는다.
//!
//! ```text
//! <dir>/
//! ├── prompts/system_prompts.yaml   coding_agent.main, tool_descriptions.*
//! ├── models.yaml                   models.*, defaults
//! ├── server_guidance.yaml          servers.<id>.<kind>, default.<kind>
//! └── knowledge/mcp_servers.yaml    servers.*, general, best_practices
//! ```

use super::document::lookup;
use super::loader::ConfigLoader;
use gmp_foundation::Result;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const SYSTEM_PROMPTS_FILE: &str = "prompts/system_prompts.yaml";
pub const MODELS_FILE: &str = "models.yaml";
pub const SERVER_GUIDANCE_FILE: &str = "server_guidance.yaml";
pub const KNOWLEDGE_FILE: &str = "knowledge/mcp_servers.yaml";

/// 기본 프롬프트 경로
pub const DEFAULT_PROMPT: &str = "coding_agent.main";

/// 프롬프트 / 모델 / 안내 문구 조회
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    loader: ConfigLoader,
    dir: PathBuf,
}

impl PromptCatalog {
    pub fn new(loader: ConfigLoader, dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ========================================================================
    // Prompts
    // ========================================================================

    /// `coding_agent.main` 같은 점 경로로 프롬프트 조회 (앞뒤 공백 제거)
    pub fn system_prompt(&self, dotted: &str) -> Result<Option<String>> {
        let data = self.document(SYSTEM_PROMPTS_FILE)?;
        match lookup(&data, dotted) {
            Some(Value::String(text)) => Ok(Some(text.trim().to_string())),
            Some(Value::Null) | None => {
                warn!("Prompt '{}' not found", dotted);
                Ok(None)
            }
            Some(other) => Ok(Some(other.to_string())),
        }
    }

    /// 도구 설명; 없으면 `Tool: <name>`
    pub fn tool_description(&self, tool: &str) -> Result<String> {
        let data = self.document(SYSTEM_PROMPTS_FILE)?;
        Ok(data
            .get("tool_descriptions")
            .and_then(|d| d.get(tool))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Tool: {}", tool)))
    }

    // ========================================================================
    // Models
    // ========================================================================

    pub fn model_config(&self, model_id: &str) -> Result<Option<Value>> {
        Ok(self.models()?.remove(model_id))
    }

    pub fn models(&self) -> Result<Map<String, Value>> {
        Ok(object_at(&self.document(MODELS_FILE)?, "models"))
    }

    pub fn model_defaults(&self) -> Result<Map<String, Value>> {
        Ok(object_at(&self.document(MODELS_FILE)?, "defaults"))
    }

    // ========================================================================
    // Server knowledge / guidance
    // ========================================================================

    /// 서버별 지식; `None`이면 `general` 섹션
    pub fn mcp_knowledge(&self, server_id: Option<&str>) -> Result<Map<String, Value>> {
        let data = self.document(KNOWLEDGE_FILE)?;
        Ok(match server_id {
            Some(id) => data
                .get("servers")
                .map(|servers| object_at(servers, id))
                .unwrap_or_default(),
            None => object_at(&data, "general"),
        })
    }

    pub fn best_practices(&self) -> Result<Vec<String>> {
        let data = self.document(KNOWLEDGE_FILE)?;
        Ok(data
            .get("best_practices")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// 서버 안내 문구 (`success`, `error`, ...)
    ///
    /// 서버 전용 문구가 없으면 `default.<kind>`를 쓰고, 이때
    /// `{server_name}`은 서버 id를 제목 형태로 바꾼 값이 된다.
    pub fn server_guidance(&self, server_id: &str, kind: &str, vars: &[(&str, &str)]) -> Result<String> {
        let data = self.document(SERVER_GUIDANCE_FILE)?;
        let mut values: BTreeMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let specific = data
            .get("servers")
            .and_then(|s| s.get(server_id))
            .and_then(|s| s.get(kind))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        let template = match specific {
            Some(text) => text.to_string(),
            None => match data.get("default").and_then(|d| d.get(kind)).and_then(Value::as_str) {
                Some(text) => {
                    values.insert("server_name".to_string(), title_case(server_id));
                    text.to_string()
                }
                None => String::new(),
            },
        };

        Ok(render_template(&template, &values))
    }

    /// 카탈로그 파일 캐시 무효화
    pub fn reload(&self) {
        for file in [SYSTEM_PROMPTS_FILE, MODELS_FILE, SERVER_GUIDANCE_FILE, KNOWLEDGE_FILE] {
            self.loader.invalidate(&self.dir.join(file));
        }
        debug!("Prompt catalog reloaded: {}", self.dir.display());
    }

    /// 파일이 없으면 빈 문서
    fn document(&self, file: &str) -> Result<Value> {
        let path = self.dir.join(file);
        match self.loader.load_optional(&path)? {
            Some(document) => Ok(document.into_value()),
            None => {
                debug!("Prompt file not found: {}", path.display());
                Ok(Value::Null)
            }
        }
    }
}

fn object_at(value: &Value, key: &str) -> Map<String, Value> {
    value
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// `{name}` 치환; `{{` / `}}`는 중괄호 하나로, 모르는 이름은 그대로 둔다
pub fn render_template(template: &str, vars: &BTreeMap<String, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| match caps.get(1) {
            Some(name) => match vars.get(name.as_str()) {
                Some(value) => value.clone(),
                None => {
                    warn!("Missing variable '{}' in guidance template", name.as_str());
                    caps[0].to_string()
                }
            },
            None => caps[0][..1].to_string(),
        })
        .into_owned()
}

/// `brave-search` → `Brave Search`
fn title_case(id: &str) -> String {
    id.replace(|c: char| c == '-' || c == '_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gmp_foundation::{CacheConfig, CacheStore, Namespace};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(dir: &Path, file: &str, content: &str) {
        let path = dir.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn catalog(dir: &TempDir) -> PromptCatalog {
        let cache = Arc::new(CacheStore::open(CacheConfig::at(dir.path().join("cache"))));
        PromptCatalog::new(ConfigLoader::new(cache), dir.path().join("config"))
    }

    #[test]
    fn test_system_prompt_lookup() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("config"),
            SYSTEM_PROMPTS_FILE,
            "coding_agent:\n  main: |\n    You are a coding agent.\ntool_descriptions:\n  read_file: Read a file\n",
        );
        let catalog = catalog(&dir);

        assert_eq!(
            catalog.system_prompt(DEFAULT_PROMPT).unwrap().as_deref(),
            Some("You are a coding agent.")
        );
        assert!(catalog.system_prompt("coding_agent.other").unwrap().is_none());
        assert_eq!(catalog.tool_description("read_file").unwrap(), "Read a file");
        assert_eq!(catalog.tool_description("grep").unwrap(), "Tool: grep");
    }

    #[test]
    fn test_missing_files_are_empty() {
        let dir = TempDir::new().unwrap();
        let catalog = catalog(&dir);

        assert!(catalog.models().unwrap().is_empty());
        assert!(catalog.best_practices().unwrap().is_empty());
        assert_eq!(catalog.server_guidance("memory", "success", &[]).unwrap(), "");
    }

    #[test]
    fn test_models() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("config"),
            MODELS_FILE,
            "models:\n  small:\n    context: 8192\ndefaults:\n  temperature: 0.2\n",
        );
        let catalog = catalog(&dir);

        let small = catalog.model_config("small").unwrap().unwrap();
        assert_eq!(small["context"], 8192);
        assert!(catalog.model_config("huge").unwrap().is_none());
        assert_eq!(catalog.model_defaults().unwrap()["temperature"], 0.2);
    }

    #[test]
    fn test_server_guidance_fallback() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("config"),
            SERVER_GUIDANCE_FILE,
            concat!(
                "servers:\n",
                "  filesystem:\n",
                "    success: \"Mounted {path}\"\n",
                "default:\n",
                "  success: \"{server_name} is ready\"\n",
                "  error: \"{server_name} failed: {reason}\"\n",
            ),
        );
        let catalog = catalog(&dir);

        assert_eq!(
            catalog.server_guidance("filesystem", "success", &[("path", "/tmp")]).unwrap(),
            "Mounted /tmp"
        );
        assert_eq!(
            catalog.server_guidance("brave-search", "success", &[]).unwrap(),
            "Brave Search is ready"
        );
        assert_eq!(
            catalog.server_guidance("memory", "error", &[]).unwrap(),
            "Memory failed: {reason}"
        );
    }

    #[test]
    fn test_knowledge() {
        let dir = TempDir::new().unwrap();
        write(
            &dir.path().join("config"),
            KNOWLEDGE_FILE,
            "general:\n  transport: stdio\nservers:\n  memory:\n    package: server-memory\nbest_practices:\n  - Pin versions\n",
        );
        let catalog = catalog(&dir);

        assert_eq!(catalog.mcp_knowledge(None).unwrap()["transport"], "stdio");
        assert_eq!(catalog.mcp_knowledge(Some("memory")).unwrap()["package"], "server-memory");
        assert!(catalog.mcp_knowledge(Some("unknown")).unwrap().is_empty());
        assert_eq!(catalog.best_practices().unwrap(), vec!["Pin versions".to_string()]);
    }

    #[test]
    fn test_reload_invalidates_cached_documents() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("config"), MODELS_FILE, "models: {}\n");
        let catalog = catalog(&dir);

        catalog.models().unwrap();
        let cache = catalog.loader.cache().clone();
        assert_eq!(cache.stats().unwrap().entries(Namespace::Config), 1);

        catalog.reload();
        assert_eq!(cache.stats().unwrap().entries(Namespace::Config), 0);
    }

    #[test]
    fn test_render_template() {
        let mut vars = BTreeMap::new();
        vars.insert("name".to_string(), "memory".to_string());

        assert_eq!(render_template("{name} ok", &vars), "memory ok");
        assert_eq!(render_template("{{name}}", &vars), "{name}");
        assert_eq!(render_template("{other}", &vars), "{other}");
        assert_eq!(title_case("sequential-thinking"), "Sequential Thinking");
    }
}
