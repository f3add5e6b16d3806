// src/sources.rs
// Built-in source catalog plus an optional TOML override file. The catalog is
// fixed per invocation; nothing mutates it after startup.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::records::SourceDescriptor;

pub const MODEL_DAILY_LIMIT: usize = 50;
pub const NEWS_DAILY_LIMIT: usize = 20;
/// Extra attempts for one completion call before the record is failed.
pub const ENRICH_RETRIES: u32 = 2;

#[derive(Debug, Clone)]
pub struct SourceCatalog {
    pub models: Vec<SourceDescriptor>,
    pub news: Vec<SourceDescriptor>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    models: Vec<SourceDescriptor>,
    #[serde(default)]
    news: Vec<SourceDescriptor>,
}

impl SourceCatalog {
    /// The statically configured model catalogs and news feeds.
    pub fn builtin() -> Self {
        let models = vec![
            SourceDescriptor::new(
                "openrouter",
                "OpenRouter",
                "https://openrouter.ai/models",
                Some("https://openrouter.ai/api/v1/models"),
            ),
            SourceDescriptor::new(
                "huggingface",
                "HuggingFace Models",
                "https://huggingface.co/models",
                Some("https://huggingface.co/api/models?limit=50&sort=downloads"),
            ),
            SourceDescriptor::new(
                "litellm",
                "LiteLLM",
                "https://litellm.ai",
                Some("https://docs.litellm.ai/docs/providers"),
            ),
        ];
        let news = vec![
            SourceDescriptor::new(
                "jiqizhixin",
                "机器之心",
                "https://www.jiqizhixin.com",
                Some("https://www.jiqizhixin.com/rss"),
            ),
            SourceDescriptor::new(
                "qbitai",
                "量子位",
                "https://www.qbitai.com",
                Some("https://www.qbitai.com/feed"),
            ),
            SourceDescriptor::new(
                "36kr-ai",
                "36氪AI",
                "https://36kr.com/column/104812",
                Some("https://36kr.com/feed"),
            ),
            SourceDescriptor::new(
                "tmtpost-ai",
                "钛媒体AI",
                "https://www.tmtpost.com/column/ai",
                Some("https://www.tmtpost.com/rss"),
            ),
            SourceDescriptor::new(
                "ai-xinzhiyuan",
                "新智元",
                "https://www.ai-xinzhiyuan.com",
                Some("https://www.ai-xinzhiyuan.com/feed"),
            ),
            SourceDescriptor::new(
                "infoq-ai",
                "InfoQ中国",
                "https://www.infoq.cn/topic/artificial-intelligence",
                Some("https://www.infoq.cn/feed"),
            ),
        ];
        Self { models, news }
    }

    /// Parse a catalog override from TOML (`[[models]]` / `[[news]]` tables).
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading source catalog from {}", path.display()))?;
        let parsed: CatalogFile = toml::from_str(&content)
            .with_context(|| format!("parsing source catalog {}", path.display()))?;
        Ok(Self {
            models: parsed.models,
            news: parsed.news,
        })
    }

    /// Use the override file when it exists and parses; otherwise the
    /// built-in catalog. A broken override is reported, not fatal.
    pub fn load_or_builtin(path: Option<&Path>) -> Self {
        match path {
            Some(p) if p.exists() => match Self::load(p) {
                Ok(catalog) => catalog,
                Err(error) => {
                    warn!(path = %p.display(), error = %error, "ignoring broken source catalog override");
                    Self::builtin()
                }
            },
            _ => Self::builtin(),
        }
    }
}
