// src/persist.rs
// Supabase (PostgREST) persistence client. Upserts are idempotent on the
// record's logical key, and schema drift on optional correlation columns is
// recovered by one retry with those columns stripped. Error classification is
// driven by PostgREST error codes, not message substrings, with a substring
// fallback only when the body is unstructured.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tracing::debug;
use url::Url;

use crate::config::PersistConfig;
use crate::records::{ArticleRecord, ModelRecord};
use crate::run::RunRecord;

/// Columns that may not exist yet on older deployments; stripped and retried
/// once when the store rejects them.
const OPTIONAL_COLUMNS: &[&str] = &["crawl_run_id", "last_crawled_at"];

const PG_UNDEFINED_COLUMN: &str = "42703";
const PG_UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store rejected unknown column '{column}'")]
    UnknownColumn { column: String },
    #[error("store is missing table '{table}'")]
    MissingTable { table: String },
    #[error("store request failed [{status}]: {message}")]
    Http { status: u16, message: String },
    #[error("store transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Deserialize)]
struct PostgrestBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a non-2xx PostgREST reply onto the typed error taxonomy.
pub fn classify_postgrest_error(status: u16, body: &str) -> PersistError {
    let parsed: Option<PostgrestBody> = serde_json::from_str(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.as_deref());
    let message = parsed
        .as_ref()
        .and_then(|b| b.message.clone())
        .unwrap_or_else(|| body.trim().to_string());

    match code {
        Some(PG_UNDEFINED_COLUMN) => PersistError::UnknownColumn {
            column: extract_quoted(&message, "column").unwrap_or_else(|| message.clone()),
        },
        Some(PG_UNDEFINED_TABLE) => PersistError::MissingTable {
            table: extract_quoted(&message, "relation").unwrap_or_else(|| message.clone()),
        },
        _ => {
            // Unstructured body: fall back to the wording Postgres uses.
            if message.contains("does not exist") {
                if let Some(column) = extract_quoted(&message, "column") {
                    return PersistError::UnknownColumn { column };
                }
                if let Some(table) = extract_quoted(&message, "relation") {
                    return PersistError::MissingTable { table };
                }
            }
            PersistError::Http { status, message }
        }
    }
}

/// Pull the quoted identifier out of `column "x" ...` / `relation "y" ...`.
fn extract_quoted(message: &str, noun: &str) -> Option<String> {
    static RE: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r#"(column|relation) ["']?([A-Za-z0-9_.]+)["']?"#).unwrap()
    });
    re.captures_iter(message)
        .find(|c| &c[1] == noun)
        .map(|c| c[2].to_string())
}

/// Accept RFC3339 or RFC2822 input; anything else is dropped rather than
/// persisted mangled.
fn normalize_timestamp(value: Option<&str>) -> Option<String> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).to_rfc3339());
    }
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc2822) {
        return dt.to_offset(time::UtcOffset::UTC).format(&Rfc3339).ok();
    }
    None
}

fn strip_optional_columns(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .iter()
                .filter(|(k, _)| !OPTIONAL_COLUMNS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Value::Object(kept)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_optional_columns).collect()),
        other => other.clone(),
    }
}

pub(crate) fn model_payload(row: &ModelRecord, run_id: &str, crawled_at: &str) -> Value {
    let description = row.description.trim();
    json!({
        "name": row.name.trim(),
        "provider": row.provider.trim(),
        "description": if description.is_empty() { Value::Null } else { description.into() },
        "cost_input": row.cost_input,
        "cost_output": row.cost_output,
        "api_url": row.api_url,
        "docs_url": row.docs_url,
        "business_scenarios": row.business_scenarios,
        "release_date": row.release_date,
        "source_url": row.source_url,
        "updated_at": crawled_at,
        "crawl_run_id": run_id,
        "last_crawled_at": crawled_at,
    })
}

pub(crate) fn article_payload(row: &ArticleRecord, run_id: &str, crawled_at: &str) -> Value {
    let summary = row.summary.trim();
    let content = row.content.trim();
    let source = row.source.trim();
    json!({
        "title": row.title.trim(),
        "summary": if summary.is_empty() { Value::Null } else { summary.into() },
        "content": if content.is_empty() { Value::Null } else { content.into() },
        "source": if source.is_empty() { Value::Null } else { source.into() },
        "url": row.url.trim(),
        "tags": row.tags,
        "published_at": normalize_timestamp(row.published_at.as_deref()),
        "crawl_run_id": run_id,
        "last_crawled_at": crawled_at,
    })
}

/// Persistence capability consumed by the run orchestrator. `PersistClient`
/// is the production implementation; tests substitute in-memory stores.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn upsert_models(&self, rows: &[ModelRecord], run_id: &str)
        -> Result<usize, PersistError>;
    async fn upsert_articles(
        &self,
        rows: &[ArticleRecord],
        run_id: &str,
    ) -> Result<usize, PersistError>;
    async fn insert_run(&self, run: &RunRecord) -> Result<(), PersistError>;
}

pub struct PersistClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

impl PersistClient {
    pub fn new(config: &PersistConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key: config.key.clone(),
        }
    }

    fn rest_url(&self, table: &str, pairs: &[(&str, String)]) -> Result<Url, PersistError> {
        let mut url = Url::parse(&format!("{}/rest/v1/{table}", self.base_url)).map_err(|e| {
            PersistError::Http {
                status: 0,
                message: format!("invalid store url: {e}"),
            }
        })?;
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (k, v) in pairs {
                query.append_pair(k, v);
            }
        }
        Ok(url)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        url: Url,
        payload: Option<&Value>,
        prefer: Option<&str>,
    ) -> Result<Vec<Value>, PersistError> {
        let mut builder = self
            .http
            .request(method, url)
            .header("apikey", &self.key)
            .bearer_auth(&self.key);
        if let Some(prefer) = prefer {
            builder = builder.header("Prefer", prefer);
        }
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.as_u16() >= 400 {
            return Err(classify_postgrest_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(other) => Ok(vec![other]),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Write with one strip-and-retry when the store lacks an optional
    /// correlation column; other failures propagate.
    async fn write_tolerating_drift(
        &self,
        method: reqwest::Method,
        url: Url,
        payload: &Value,
        prefer: &str,
    ) -> Result<(), PersistError> {
        match self
            .request(method.clone(), url.clone(), Some(payload), Some(prefer))
            .await
        {
            Ok(_) => Ok(()),
            Err(PersistError::UnknownColumn { column }) => {
                debug!(column = %column, "store lacks optional column, retrying without it");
                let reduced = strip_optional_columns(payload);
                self.request(method, url, Some(&reduced), Some(prefer))
                    .await
                    .map(|_| ())
            }
            Err(error) => Err(error),
        }
    }

}

#[async_trait]
impl RecordStore for PersistClient {
    /// Idempotent model upsert keyed on `(name, provider)`. Records with an
    /// empty name or provider are skipped silently. Returns how many records
    /// were written.
    async fn upsert_models(
        &self,
        rows: &[ModelRecord],
        run_id: &str,
    ) -> Result<usize, PersistError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let crawled_at = Utc::now().to_rfc3339();
        let mut persisted = 0usize;

        for row in rows {
            let name = row.name.trim();
            let provider = row.provider.trim();
            if name.is_empty() || provider.is_empty() {
                continue;
            }

            let lookup = self.rest_url(
                "models",
                &[
                    ("select", "id".to_string()),
                    ("name", format!("eq.{name}")),
                    ("provider", format!("eq.{provider}")),
                    ("limit", "1".to_string()),
                ],
            )?;
            let existing = self
                .request(reqwest::Method::GET, lookup, None, None)
                .await?;
            let payload = model_payload(row, run_id, &crawled_at);

            match existing.first().and_then(|v| v.get("id")) {
                Some(id) => {
                    let id = match id {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let url =
                        self.rest_url("models", &[("id", format!("eq.{id}"))])?;
                    self.write_tolerating_drift(
                        reqwest::Method::PATCH,
                        url,
                        &payload,
                        "return=minimal",
                    )
                    .await?;
                }
                None => {
                    let url = self.rest_url("models", &[])?;
                    self.write_tolerating_drift(
                        reqwest::Method::POST,
                        url,
                        &payload,
                        "return=minimal",
                    )
                    .await?;
                }
            }
            persisted += 1;
        }
        Ok(persisted)
    }

    /// Bulk article upsert keyed on URL with merge-on-conflict. Records with
    /// an empty URL or title are skipped silently.
    async fn upsert_articles(
        &self,
        rows: &[ArticleRecord],
        run_id: &str,
    ) -> Result<usize, PersistError> {
        let crawled_at = Utc::now().to_rfc3339();
        let payloads: Vec<Value> = rows
            .iter()
            .filter(|r| !r.url.trim().is_empty() && !r.title.trim().is_empty())
            .map(|r| article_payload(r, run_id, &crawled_at))
            .collect();
        if payloads.is_empty() {
            return Ok(0);
        }

        let url = self.rest_url("articles", &[("on_conflict", "url".to_string())])?;
        let count = payloads.len();
        self.write_tolerating_drift(
            reqwest::Method::POST,
            url,
            &Value::Array(payloads),
            "resolution=merge-duplicates,return=minimal",
        )
        .await?;
        Ok(count)
    }

    /// Insert-only run record. A deployment without the `crawler_runs` table
    /// is tolerated; any other failure propagates.
    async fn insert_run(&self, run: &RunRecord) -> Result<(), PersistError> {
        let payload = json!({
            "id": run.run_id,
            "started_at": run.started_at,
            "finished_at": run.finished_at,
            "status": run.status.as_str(),
            "model_persisted": run.model_persisted,
            "article_persisted": run.article_persisted,
            "error_message": run.error_message,
        });
        let url = self.rest_url("crawler_runs", &[])?;
        match self
            .request(reqwest::Method::POST, url, Some(&payload), Some("return=minimal"))
            .await
        {
            Ok(_) => Ok(()),
            Err(PersistError::MissingTable { table }) if table.contains("crawler_runs") => Ok(()),
            Err(PersistError::Http { message, .. }) if message.contains("crawler_runs") => Ok(()),
            Err(error) => Err(error),
        }
    }
}
