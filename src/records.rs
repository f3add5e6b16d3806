// src/records.rs
// Value types flowing through the pipeline. Records are compared by their
// normalized identity (see `transform`), never by provenance; no record holds
// a back-reference to its source. Enrichment builds modified copies with
// struct-update syntax instead of mutating in place.

use serde::{Deserialize, Serialize};

/// Statically configured origin of candidate records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub key: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub fallback: Option<String>,
}

impl SourceDescriptor {
    pub fn new(key: &str, name: &str, url: &str, fallback: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            fallback: fallback.map(str::to_string),
        }
    }

    /// Preferred fetch endpoint: the machine-readable fallback when present.
    pub fn endpoint(&self) -> &str {
        self.fallback.as_deref().unwrap_or(&self.url)
    }
}

/// One entry of a model catalog, before or after enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cost_input: Option<f64>,
    #[serde(default)]
    pub cost_output: Option<f64>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub docs_url: Option<String>,
    #[serde(default)]
    pub business_scenarios: Vec<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub source_url: String,
}

/// One news article, before or after enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub source: String,
    pub url: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}
