// src/run.rs
// Run orchestration: the model and news pipelines run independently, each
// under its own deadline; a pipeline failure is recorded by name and never
// stops the other pipeline. Exactly one run record is written at the end,
// best-effort.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::enrich::{ArkClient, CompletionClient, Enricher};
use crate::fetch::{Fetcher, RetryPolicy};
use crate::ingest::adapters::{ModelCatalogAdapter, RssNewsAdapter};
use crate::ingest::{ingest, SourceAdapter};
use crate::persist::{PersistClient, RecordStore};
use crate::records::{ArticleRecord, ModelRecord};
use crate::sources::{SourceCatalog, MODEL_DAILY_LIMIT, NEWS_DAILY_LIMIT};
use crate::transform::{dedupe_by_url, dedupe_models};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    /// Status truth table. Nothing persisted is a failed run regardless of
    /// errors; anything persisted alongside errors (or with only one kind
    /// persisted) is partial; both kinds persisted without errors is success.
    pub fn derive(model_persisted: usize, article_persisted: usize, had_errors: bool) -> Self {
        if model_persisted == 0 && article_persisted == 0 {
            return RunStatus::Failed;
        }
        if had_errors {
            return RunStatus::Partial;
        }
        if model_persisted > 0 && article_persisted > 0 {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }
}

/// Written exactly once per invocation, after both pipelines complete.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub status: RunStatus,
    pub model_persisted: usize,
    pub article_persisted: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PipelineStats {
    pub sources: usize,
    pub fetched: usize,
    pub deduped: usize,
    pub persisted: usize,
}

/// The single JSON object printed to stdout at the end of a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub timestamp_utc: String,
    pub status: RunStatus,
    pub errors: Vec<String>,
    pub models: PipelineStats,
    pub articles: PipelineStats,
}

/// Everything one run collaborates with. `run_crawler` wires the production
/// pieces; anything behind a trait can be substituted.
pub struct RunEnv<'a> {
    pub catalog: &'a SourceCatalog,
    pub model_adapter: &'a dyn SourceAdapter<ModelRecord>,
    pub news_adapter: &'a dyn SourceAdapter<ArticleRecord>,
    pub completion: Option<Arc<dyn CompletionClient>>,
    pub store: &'a dyn RecordStore,
    pub pipeline_deadline: Duration,
}

fn build_enricher(
    completion: &Option<Arc<dyn CompletionClient>>,
) -> Result<Enricher> {
    Enricher::from_client(completion.clone(), RetryPolicy::standard())
}

async fn model_pipeline(env: &RunEnv<'_>, run_id: &str, limit: usize) -> Result<PipelineStats> {
    let outcome = ingest(env.model_adapter, &env.catalog.models, limit).await;
    let fetched = outcome.records.len();

    let deduped = dedupe_models(outcome.records);
    let deduped_count = deduped.len();

    let enricher = build_enricher(&env.completion)?;
    let enriched = enricher.enrich_models(deduped).await?;
    let persisted = env.store.upsert_models(&enriched, run_id).await?;

    Ok(PipelineStats {
        sources: outcome.sources_attempted,
        fetched,
        deduped: deduped_count,
        persisted,
    })
}

async fn news_pipeline(env: &RunEnv<'_>, run_id: &str, limit: usize) -> Result<PipelineStats> {
    let outcome = ingest(env.news_adapter, &env.catalog.news, limit).await;
    let fetched = outcome.records.len();

    let deduped = dedupe_by_url(outcome.records);
    let deduped_count = deduped.len();

    let enricher = build_enricher(&env.completion)?;
    let enriched = enricher.enrich_articles(deduped).await?;
    let persisted = env.store.upsert_articles(&enriched, run_id).await?;

    Ok(PipelineStats {
        sources: outcome.sources_attempted,
        fetched,
        deduped: deduped_count,
        persisted,
    })
}

/// Run both pipelines against the given collaborators and produce the
/// combined report. Never returns an error: every failure mode ends up in
/// the report instead, and a failure in one pipeline never stops the other.
pub async fn execute_run(env: &RunEnv<'_>, model_limit: usize, news_limit: usize) -> RunReport {
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now().to_rfc3339();

    let model_limit = if model_limit == 0 {
        MODEL_DAILY_LIMIT
    } else {
        model_limit
    };
    let news_limit = if news_limit == 0 { NEWS_DAILY_LIMIT } else { news_limit };

    let mut errors: Vec<String> = Vec::new();

    let model_stats = match tokio::time::timeout(
        env.pipeline_deadline,
        model_pipeline(env, &run_id, model_limit),
    )
    .await
    .map_err(|_| anyhow!("deadline of {}s exceeded", env.pipeline_deadline.as_secs()))
    .and_then(|inner| inner)
    {
        Ok(stats) => stats,
        Err(cause) => {
            error!(pipeline = "models", error = %format!("{cause:#}"), "pipeline failed");
            errors.push(format!("models: {cause:#}"));
            PipelineStats {
                sources: env.catalog.models.len(),
                ..PipelineStats::default()
            }
        }
    };

    let article_stats = match tokio::time::timeout(
        env.pipeline_deadline,
        news_pipeline(env, &run_id, news_limit),
    )
    .await
    .map_err(|_| anyhow!("deadline of {}s exceeded", env.pipeline_deadline.as_secs()))
    .and_then(|inner| inner)
    {
        Ok(stats) => stats,
        Err(cause) => {
            error!(pipeline = "articles", error = %format!("{cause:#}"), "pipeline failed");
            errors.push(format!("articles: {cause:#}"));
            PipelineStats {
                sources: env.catalog.news.len(),
                ..PipelineStats::default()
            }
        }
    };

    let status = RunStatus::derive(
        model_stats.persisted,
        article_stats.persisted,
        !errors.is_empty(),
    );
    let finished_at = Utc::now().to_rfc3339();

    let record = RunRecord {
        run_id: run_id.clone(),
        started_at,
        finished_at: finished_at.clone(),
        status,
        model_persisted: model_stats.persisted,
        article_persisted: article_stats.persisted,
        error_message: if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        },
    };
    // Best-effort: a run-record write failure must not fail the run.
    if let Err(cause) = env.store.insert_run(&record).await {
        warn!(error = %cause, "failed to record crawler run");
    }

    info!(
        run_id = %run_id,
        status = status.as_str(),
        models = model_stats.persisted,
        articles = article_stats.persisted,
        "run finished"
    );

    RunReport {
        run_id,
        timestamp_utc: finished_at,
        status,
        errors,
        models: model_stats,
        articles: article_stats,
    }
}

/// Production entry point: wire the real fetcher, adapters, completion
/// client, and persistence client from config, then run.
pub async fn run_crawler(
    config: &AppConfig,
    model_limit: usize,
    news_limit: usize,
) -> RunReport {
    let catalog = SourceCatalog::load_or_builtin(config.sources_path.as_deref());
    let fetcher = Fetcher::new(RetryPolicy::standard());
    let model_adapter = ModelCatalogAdapter::new(fetcher.clone());
    let news_adapter = RssNewsAdapter::new(fetcher);
    let completion: Option<Arc<dyn CompletionClient>> = config
        .ark
        .clone()
        .map(|ark| Arc::new(ArkClient::new(ark)) as Arc<dyn CompletionClient>);
    let persist = PersistClient::new(&config.persist);

    let env = RunEnv {
        catalog: &catalog,
        model_adapter: &model_adapter,
        news_adapter: &news_adapter,
        completion,
        store: &persist,
        pipeline_deadline: config.pipeline_deadline,
    };
    execute_run(&env, model_limit, news_limit).await
}
