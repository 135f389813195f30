//! # Configuration documents
//!
//! 설정 파일(YAML / JSON / TOML)을 읽어 JSON 트리로 돌려준다.
//! 파싱 결과는 `configs/` 캐시에 저장되고, 파일 내용이 바뀌면
//! fingerprint 불일치로 다시 파싱된다.
//!
//! ## 사용 예시
//!
//! ```ignore
//! use gmp_core::config::{ConfigLoader, PromptCatalog};
//!
//! let loader = ConfigLoader::new(cache.clone());
//! let providers = loader.load_providers(&servers_file)?;
//!
//! let prompts = PromptCatalog::new(loader, config_dir);
//! let system = prompts.system_prompt("coding_agent.main")?;
//! ```

mod document;
mod loader;
mod prompts;

pub use document::{lookup, Document, DocumentFormat};
pub use loader::ConfigLoader;
pub use prompts::{
    render_template, PromptCatalog, DEFAULT_PROMPT, KNOWLEDGE_FILE, MODELS_FILE,
    SERVER_GUIDANCE_FILE, SYSTEM_PROMPTS_FILE,
};
