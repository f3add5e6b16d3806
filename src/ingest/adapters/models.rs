// src/ingest/adapters/models.rs
// Model-catalog adapters: map each source's machine-readable endpoint into
// candidate `ModelRecord`s. Mapping is separated from fetching so payload
// handling is testable on fixtures; payload-shape surprises surface as errors
// and are isolated by the ingestion orchestrator.

use anyhow::{bail, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;

use crate::fetch::Fetcher;
use crate::ingest::SourceAdapter;
use crate::records::{ModelRecord, SourceDescriptor};
use crate::transform::dedupe_models;

/// HuggingFace pipeline tag → canonical business scenario.
static SCENARIO_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("text-generation", "内容生成"),
        ("text2text-generation", "内容生成"),
        ("question-answering", "知识问答"),
        ("summarization", "文档处理"),
        ("translation", "文档处理"),
        ("text-classification", "数据分析"),
        ("image-to-text", "图像处理"),
        ("image-classification", "图像处理"),
        ("automatic-speech-recognition", "语音处理"),
        ("feature-extraction", "数据分析"),
    ])
});

/// Seed names used when the LiteLLM catalog page yields nothing usable.
const LITELLM_SEED: &[&str] = &["gpt-4o-mini", "claude-3-5-sonnet", "deepseek-chat"];

/// Parse a price field into cost-per-token terms. Sub-cent values are
/// per-token prices and get scaled to per-million.
pub fn safe_cost(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.replace(['$', ','], "").trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if raw < 0.0 {
        return None;
    }
    let scaled = if raw > 0.0 && raw < 0.01 {
        raw * 1_000_000.0
    } else {
        raw
    };
    Some((scaled * 10_000.0).round() / 10_000.0)
}

fn string_field(item: &Value, key: &str) -> Option<String> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// Map an OpenRouter `/api/v1/models` payload (`{"data":[...]}` or a bare
/// array) into candidate records.
pub fn map_openrouter(
    payload: &Value,
    source: &SourceDescriptor,
    limit: usize,
) -> Result<Vec<ModelRecord>> {
    let rows = match payload.get("data") {
        Some(Value::Array(rows)) => rows.as_slice(),
        _ => match payload {
            Value::Array(rows) => rows.as_slice(),
            _ => bail!("openrouter payload has no model list"),
        },
    };

    let mut records = Vec::new();
    for item in rows.iter().take(limit * 2) {
        let id = string_field(item, "id");
        let name = match string_field(item, "name").or_else(|| id.clone()) {
            Some(n) => n,
            None => continue,
        };
        let pricing = item.get("pricing").cloned().unwrap_or(Value::Null);
        let modality = item
            .get("architecture")
            .and_then(|a| a.get("modality"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase();
        let scenarios = if modality.is_empty() {
            Vec::new()
        } else if modality.contains("image") {
            vec!["多模态".to_string()]
        } else {
            vec!["内容生成".to_string()]
        };

        records.push(ModelRecord {
            name,
            provider: "OpenRouter".to_string(),
            description: string_field(item, "description").unwrap_or_default(),
            cost_input: pricing.get("prompt").and_then(safe_cost),
            cost_output: pricing.get("completion").and_then(safe_cost),
            docs_url: id.clone(),
            business_scenarios: scenarios,
            source_url: id
                .map(|i| format!("https://openrouter.ai/models/{i}"))
                .unwrap_or_else(|| source.url.clone()),
            ..ModelRecord::default()
        });
    }
    records.truncate(limit);
    Ok(records)
}

/// Map a HuggingFace `/api/models` payload (a bare array of models) into
/// candidate records.
pub fn map_huggingface(payload: &Value, limit: usize) -> Result<Vec<ModelRecord>> {
    let rows = match payload {
        Value::Array(rows) => rows,
        _ => bail!("huggingface payload is not a model list"),
    };

    let mut records = Vec::new();
    for item in rows.iter().take(limit * 2) {
        let model_id = match string_field(item, "id") {
            Some(id) => id,
            None => continue,
        };
        let pipeline_tag = string_field(item, "pipeline_tag")
            .unwrap_or_default()
            .to_lowercase();
        let scenario = SCENARIO_MAP
            .get(pipeline_tag.as_str())
            .copied()
            .unwrap_or("内容生成");

        records.push(ModelRecord {
            name: model_id.clone(),
            provider: "HuggingFace".to_string(),
            description: format!(
                "pipeline={}",
                if pipeline_tag.is_empty() {
                    "unknown"
                } else {
                    pipeline_tag.as_str()
                }
            ),
            business_scenarios: vec![scenario.to_string()],
            source_url: format!("https://huggingface.co/{model_id}"),
            ..ModelRecord::default()
        });
    }
    records.truncate(limit);
    Ok(records)
}

/// LiteLLM seed catalog. The upstream catalog is an HTML docs page; scraping
/// heuristics live outside this crate, so the seed list stands in once the
/// page proved reachable.
pub fn litellm_seed(source: &SourceDescriptor, limit: usize) -> Vec<ModelRecord> {
    LITELLM_SEED
        .iter()
        .take(limit)
        .map(|name| ModelRecord {
            name: name.to_string(),
            provider: "LiteLLM".to_string(),
            description: "LiteLLM provider/model catalog entry".to_string(),
            business_scenarios: vec!["自动化工作流".to_string()],
            source_url: source.url.clone(),
            ..ModelRecord::default()
        })
        .collect()
}

pub struct ModelCatalogAdapter {
    fetcher: Fetcher,
}

impl ModelCatalogAdapter {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SourceAdapter<ModelRecord> for ModelCatalogAdapter {
    async fn fetch(&self, source: &SourceDescriptor, limit: usize) -> Result<Vec<ModelRecord>> {
        let records = match source.key.as_str() {
            "openrouter" => {
                let payload = self.fetcher.fetch_json(source.endpoint()).await?;
                map_openrouter(&payload, source, limit)?
            }
            "huggingface" => {
                let payload = self.fetcher.fetch_json(source.endpoint()).await?;
                map_huggingface(&payload, limit)?
            }
            "litellm" => {
                self.fetcher.fetch_text(source.endpoint()).await?;
                litellm_seed(source, limit)
            }
            other => bail!("no model adapter registered for source '{other}'"),
        };
        let mut deduped = dedupe_models(records);
        deduped.truncate(limit);
        Ok(deduped)
    }

    fn kind(&self) -> &'static str {
        "models"
    }
}
