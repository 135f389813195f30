//! Parsed configuration documents

use gmp_foundation::{line_at, Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Source format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// `.json` / `.toml` by extension, YAML otherwise
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => DocumentFormat::Json,
            Some("toml") => DocumentFormat::Toml,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// A parsed YAML / JSON / TOML file as a JSON value tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub format: DocumentFormat,
    pub content: Value,
}

impl Document {
    /// Parse `text` read from `path`
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let format = DocumentFormat::from_path(path);
        let content = match format {
            DocumentFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                line: (e.line() > 0).then(|| e.line()),
                message: e.to_string(),
            })?,
            DocumentFormat::Toml => toml::from_str::<Value>(text).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                line: e.span().map(|span| line_at(text, span.start)),
                message: e.message().to_string(),
            })?,
            DocumentFormat::Yaml if text.trim().is_empty() => Value::Null,
            DocumentFormat::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| Error::ConfigParse {
                path: path.to_path_buf(),
                line: e.location().map(|loc| loc.line()),
                message: e.to_string(),
            })?,
        };

        Ok(Self { format, content })
    }

    /// Value at a dotted path (`coding_agent.main`); array indices are numeric segments
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        lookup(&self.content, dotted)
    }

    pub fn get_str(&self, dotted: &str) -> Option<&str> {
        self.get(dotted).and_then(Value::as_str)
    }

    /// Typed view of a sub-tree; `None` if absent or of the wrong shape
    pub fn get_as<T: DeserializeOwned>(&self, dotted: &str) -> Option<T> {
        self.get(dotted)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_empty(&self) -> bool {
        match &self.content {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn into_value(self) -> Value {
        self.content
    }
}

/// Dotted-path lookup into a JSON tree
pub fn lookup<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    if dotted.is_empty() {
        return Some(root);
    }
    dotted.split('.').try_fold(root, |current, part| match current {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_format_by_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.toml")), DocumentFormat::Toml);
        assert_eq!(DocumentFormat::from_path(Path::new("prompts.conf")), DocumentFormat::Yaml);
    }

    #[test]
    fn test_same_content_across_formats() {
        let yaml = Document::parse(Path::new("a.yaml"), "agent:\n  name: coder\n  max_steps: 5\n").unwrap();
        let json = Document::parse(
            Path::new("a.json"),
            r#"{"agent": {"name": "coder", "max_steps": 5}}"#,
        )
        .unwrap();
        let toml = Document::parse(Path::new("a.toml"), "[agent]\nname = \"coder\"\nmax_steps = 5\n").unwrap();

        assert_eq!(yaml.content, json.content);
        assert_eq!(json.content, toml.content);
    }

    #[test]
    fn test_dotted_lookup() {
        let doc = Document {
            format: DocumentFormat::Yaml,
            content: json!({
                "coding_agent": {"main": "You are a coding agent."},
                "servers": [{"name": "memory"}]
            }),
        };

        assert_eq!(doc.get_str("coding_agent.main"), Some("You are a coding agent."));
        assert_eq!(doc.get_str("servers.0.name"), Some("memory"));
        assert!(doc.get("coding_agent.missing").is_none());
        assert!(doc.get("coding_agent.main.deeper").is_none());
    }

    #[test]
    fn test_yaml_parse_error_line() {
        let path = PathBuf::from("/tmp/bad.yaml");
        let err = Document::parse(&path, "a: 1\nb: [1, 2\nc: 3\n").unwrap_err();
        match err {
            Error::ConfigParse { path: p, line, .. } => {
                assert_eq!(p, path);
                assert!(line.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_json_parse_error_line() {
        let err = Document::parse(Path::new("bad.json"), "{\n  \"a\": 1,\n  oops\n}").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { line: Some(3), .. }));
    }

    #[test]
    fn test_empty_yaml_is_empty_document() {
        let doc = Document::parse(Path::new("empty.yaml"), "").unwrap();
        assert!(doc.is_empty());
    }
}
