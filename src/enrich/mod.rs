// src/enrich/mod.rs
// Enrichment stage: ask the completion endpoint for a machine-written
// summary/description plus canonical tags, per record. The policy is strict
// and all-or-nothing: a missing credential or a single record that cannot be
// enriched fails the whole batch. There is no local-heuristic fallback.

pub mod tags;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ArkConfig;
use crate::fetch::RetryPolicy;
use crate::records::{ArticleRecord, ModelRecord};
use crate::sources::ENRICH_RETRIES;

const SYSTEM_PROMPT: &str = "You are an assistant that only returns valid JSON.";
const MAX_CONTENT_CHARS: usize = 1000;
const MAX_SUMMARY_CHARS: usize = 120;
const MAX_DESCRIPTION_CHARS: usize = 80;

/// Completion capability: one prompt in, the raw reply text out.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Production client for an OpenAI-compatible chat-completions endpoint.
pub struct ArkClient {
    http: reqwest::Client,
    config: ArkConfig,
}

impl ArkClient {
    pub fn new(config: ArkConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }
}

#[async_trait]
impl CompletionClient for ArkClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            temperature: f32,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.config.model,
            temperature: 0.1,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&req)
            .send()
            .await
            .context("completion request failed")?
            .error_for_status()
            .context("completion endpoint returned an error status")?;

        let body: Resp = response
            .json()
            .await
            .context("completion reply was not valid JSON")?;
        Ok(body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "ark"
    }
}

/// Two-phase reply parsing: the whole reply as a JSON object, else the first
/// `{...}` span within it.
pub fn extract_json_payload(text: &str) -> Option<serde_json::Map<String, Value>> {
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        return Some(map);
    }

    static RE_OBJ: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE_OBJ.get_or_init(|| regex::Regex::new(r"\{[\s\S]*\}").unwrap());
    let span = re.find(raw)?;
    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        _ => None,
    }
}

pub struct Enricher {
    client: Arc<dyn CompletionClient>,
    retry: RetryPolicy,
}

impl Enricher {
    /// Credential presence is decided here, once. `None` means enrichment is
    /// impossible and the whole stage must fail.
    pub fn from_client(
        client: Option<Arc<dyn CompletionClient>>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = client.ok_or_else(|| {
            anyhow!("completion credential not configured; enrichment is mandatory")
        })?;
        Ok(Self {
            client,
            retry: retry.with_max_retries(ENRICH_RETRIES),
        })
    }

    pub fn new(client: Arc<dyn CompletionClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            retry: retry.with_max_retries(ENRICH_RETRIES),
        }
    }

    /// One completion call with the shared retry budget; both transport
    /// failures and unparsable replies are retried.
    async fn call_json(&self, prompt: &str) -> Result<serde_json::Map<String, Value>> {
        self.retry
            .run(|| async {
                let reply = self.client.complete(prompt).await?;
                debug!(provider = self.client.name(), chars = reply.len(), "completion reply");
                extract_json_payload(&reply)
                    .ok_or_else(|| anyhow!("completion reply contained no JSON object"))
            })
            .await
    }

    pub async fn enrich_articles(&self, records: Vec<ArticleRecord>) -> Result<Vec<ArticleRecord>> {
        let mut enriched = Vec::with_capacity(records.len());
        for record in records {
            let prompt = format!(
                "请返回 JSON，结构为 {{\"summary\":\"不超过120字\",\"tags\":[\"最多3个中文标签\"]}}。\n\
                 title={}\nsource={}\ncontent={}",
                record.title,
                record.source,
                truncate_chars(&record.content, MAX_CONTENT_CHARS)
            );
            let payload = self
                .call_json(&prompt)
                .await
                .with_context(|| format!("enriching article '{}'", record.title))?;

            let summary = payload
                .get("summary")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            let tags = string_list(payload.get("tags"))
                .map(|raw| tags::canonicalize_tags(&raw))
                .unwrap_or_default();

            if summary.is_empty() || tags.is_empty() {
                bail!(
                    "article '{}' enrichment rejected: empty summary or no canonical tag",
                    record.title
                );
            }
            enriched.push(ArticleRecord {
                summary: truncate_chars(&summary, MAX_SUMMARY_CHARS),
                tags,
                ..record
            });
        }
        Ok(enriched)
    }

    pub async fn enrich_models(&self, records: Vec<ModelRecord>) -> Result<Vec<ModelRecord>> {
        let mut enriched = Vec::with_capacity(records.len());
        for record in records {
            let prompt = format!(
                "请返回 JSON，结构为 {{\"description\":\"不超过80字中文描述\",\
                 \"business_scenarios\":[\"最多3个中文业务标签\"]}}。\n\
                 name={}\nprovider={}\ndescription={}",
                record.name, record.provider, record.description
            );
            let payload = self
                .call_json(&prompt)
                .await
                .with_context(|| format!("enriching model '{}'", record.name))?;

            let description = payload
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            let scenarios = string_list(payload.get("business_scenarios"))
                .map(|raw| tags::canonicalize_tags(&raw))
                .unwrap_or_default();

            if description.is_empty() || scenarios.is_empty() {
                bail!(
                    "model '{}' enrichment rejected: empty description or no canonical scenario",
                    record.name
                );
            }
            enriched.push(ModelRecord {
                description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
                business_scenarios: scenarios,
                ..record
            });
        }
        Ok(enriched)
    }
}
