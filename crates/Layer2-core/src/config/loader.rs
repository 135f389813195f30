//! Configuration Loader
//!
//! YAML / JSON / TOML 문서를 읽고, 파싱 결과를 `configs/` 캐시에 memoize 한다.
//!
//! ## 캐시 규칙
//!
//! 1. 경로는 절대 경로로 정규화 (캐시 식별자)
//! 2. fingerprint = 파일 내용 SHA-256 (앞 16자)
//! 3. 내용이 바뀌면 fingerprint 불일치 → 다시 파싱
//!
//! 시크릿 형태의 키에 값이 들어 있는 문서는 캐시하지 않는다.
//! 캐시 사본은 redaction 되므로 새로 파싱한 값과 달라지기 때문.

use super::document::Document;
use gmp_foundation::{contains_secrets, short_hash, CacheStore, Error, Namespace, ProvidersFile, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// ConfigLoader - 설정 로더
// ============================================================================

/// 캐시를 거치는 설정 문서 로더
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    cache: Arc<CacheStore>,
}

impl ConfigLoader {
    pub fn new(cache: Arc<CacheStore>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// 절대 경로로 정규화; 없는 파일은 `ConfigNotFound`
    pub fn resolve(path: &Path) -> Result<PathBuf> {
        match fs::canonicalize(path) {
            Ok(absolute) if absolute.is_file() => Ok(absolute),
            Ok(_) => Err(Error::ConfigNotFound(path.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::ConfigNotFound(path.to_path_buf())),
            Err(e) => Err(e.into()),
        }
    }

    /// 문서 로드 (캐시 우선)
    pub fn load(&self, path: &Path) -> Result<Document> {
        let absolute = Self::resolve(path)?;
        let identifier = absolute.to_string_lossy().to_string();

        // 내용을 한 번만 읽어서 hash 와 parse 에 같이 사용
        let bytes = fs::read(&absolute).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::ConfigNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let fingerprint = short_hash(&bytes);

        if let Some(document) = self
            .cache
            .get_as::<Document>(Namespace::Config, &identifier, Some(&fingerprint))
        {
            debug!("Config loaded from cache: {}", identifier);
            return Ok(document);
        }

        let text = String::from_utf8(bytes).map_err(|e| Error::ConfigParse {
            path: absolute.clone(),
            line: None,
            message: format!("file is not valid UTF-8: {}", e),
        })?;
        let document = Document::parse(&absolute, &text)?;

        if contains_secrets(&document.content) {
            debug!(
                "Config {} contains secret-shaped keys; not caching",
                identifier
            );
        } else {
            self.cache
                .set(Namespace::Config, &identifier, &document, Some(&fingerprint));
        }

        debug!("Config parsed: {}", identifier);
        Ok(document)
    }

    /// 없는 파일은 `None`, 그 외 에러는 그대로
    pub fn load_optional(&self, path: &Path) -> Result<Option<Document>> {
        match self.load(path) {
            Ok(document) => Ok(Some(document)),
            Err(Error::ConfigNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 해당 파일의 캐시 엔트리 제거
    pub fn invalidate(&self, path: &Path) {
        let identifier = match fs::canonicalize(path) {
            Ok(absolute) => absolute,
            Err(_) => path.to_path_buf(),
        };
        self.cache
            .invalidate_quietly(Namespace::Config, &identifier.to_string_lossy());
    }

    /// `mcpServers` 파일 로드
    pub fn load_providers(&self, path: &Path) -> Result<ProvidersFile> {
        let document = self.load(path)?;
        if document.is_empty() {
            return Ok(ProvidersFile::default());
        }
        ProvidersFile::from_value(document.into_value())
    }
}
