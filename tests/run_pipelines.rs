// tests/run_pipelines.rs
// Orchestrator behavior with substituted collaborators: a failing pipeline
// is recorded under its own name and the other pipeline still runs to
// completion.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use ai_radar_crawler::enrich::CompletionClient;
use ai_radar_crawler::ingest::SourceAdapter;
use ai_radar_crawler::persist::{PersistError, RecordStore};
use ai_radar_crawler::records::{ArticleRecord, ModelRecord, SourceDescriptor};
use ai_radar_crawler::run::{execute_run, RunEnv, RunRecord, RunStatus};
use ai_radar_crawler::sources::SourceCatalog;

struct StaticModels(Vec<ModelRecord>);

#[async_trait]
impl SourceAdapter<ModelRecord> for StaticModels {
    async fn fetch(&self, _source: &SourceDescriptor, limit: usize) -> Result<Vec<ModelRecord>> {
        let mut batch = self.0.clone();
        batch.truncate(limit);
        Ok(batch)
    }

    fn kind(&self) -> &'static str {
        "models"
    }
}

struct StaticNews(Vec<ArticleRecord>);

#[async_trait]
impl SourceAdapter<ArticleRecord> for StaticNews {
    async fn fetch(&self, _source: &SourceDescriptor, limit: usize) -> Result<Vec<ArticleRecord>> {
        let mut batch = self.0.clone();
        batch.truncate(limit);
        Ok(batch)
    }

    fn kind(&self) -> &'static str {
        "articles"
    }
}

struct StalledModels;

#[async_trait]
impl SourceAdapter<ModelRecord> for StalledModels {
    async fn fetch(&self, _source: &SourceDescriptor, _limit: usize) -> Result<Vec<ModelRecord>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }

    fn kind(&self) -> &'static str {
        "models"
    }
}

#[derive(Default)]
struct MemoryStore {
    fail_articles: bool,
    fail_run_insert: bool,
    runs: Mutex<Vec<RunRecord>>,
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn upsert_models(
        &self,
        rows: &[ModelRecord],
        _run_id: &str,
    ) -> Result<usize, PersistError> {
        Ok(rows.len())
    }

    async fn upsert_articles(
        &self,
        rows: &[ArticleRecord],
        _run_id: &str,
    ) -> Result<usize, PersistError> {
        if self.fail_articles {
            return Err(PersistError::Http {
                status: 500,
                message: "article write rejected".into(),
            });
        }
        Ok(rows.len())
    }

    async fn insert_run(&self, run: &RunRecord) -> Result<(), PersistError> {
        if self.fail_run_insert {
            return Err(PersistError::Http {
                status: 500,
                message: "runs table offline".into(),
            });
        }
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }
}

// One reply shape that satisfies both the article and the model prompt.
struct CannedCompletion;

#[async_trait]
impl CompletionClient for CannedCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(concat!(
            r#"{"summary":"一句话摘要","tags":["知识问答"],"#,
            r#""description":"模型描述","business_scenarios":["代码辅助"]}"#
        )
        .to_string())
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

fn catalog() -> SourceCatalog {
    SourceCatalog {
        models: vec![SourceDescriptor::new(
            "openrouter",
            "OpenRouter",
            "https://openrouter.ai/models",
            None,
        )],
        news: vec![SourceDescriptor::new(
            "jiqizhixin",
            "机器之心",
            "https://www.jiqizhixin.com",
            None,
        )],
    }
}

fn model(name: &str) -> ModelRecord {
    ModelRecord {
        name: name.into(),
        provider: "OpenRouter".into(),
        description: "seed".into(),
        source_url: format!("https://openrouter.ai/models/{name}"),
        ..ModelRecord::default()
    }
}

fn article(title: &str, url: &str) -> ArticleRecord {
    ArticleRecord {
        title: title.into(),
        source: "机器之心".into(),
        url: url.into(),
        content: "正文内容".into(),
        ..ArticleRecord::default()
    }
}

fn completion() -> Option<Arc<dyn CompletionClient>> {
    Some(Arc::new(CannedCompletion))
}

#[tokio::test]
async fn failing_article_store_never_stops_the_model_pipeline() {
    let cat = catalog();
    let models = StaticModels(vec![model("model-a"), model("model-b")]);
    let news = StaticNews(vec![article("头条", "https://www.jiqizhixin.com/articles/1")]);
    let store = MemoryStore {
        fail_articles: true,
        ..MemoryStore::default()
    };

    let env = RunEnv {
        catalog: &cat,
        model_adapter: &models,
        news_adapter: &news,
        completion: completion(),
        store: &store,
        pipeline_deadline: Duration::from_secs(5),
    };
    let report = execute_run(&env, 10, 10).await;

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("articles: "));
    assert!(report.errors[0].contains("article write rejected"));

    assert_eq!(report.models.fetched, 2);
    assert_eq!(report.models.persisted, 2);
    assert_eq!(report.articles.persisted, 0);
    assert_eq!(report.status, RunStatus::Partial);

    let runs = store.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].model_persisted, 2);
    assert_eq!(runs[0].article_persisted, 0);
    assert!(runs[0]
        .error_message
        .as_deref()
        .unwrap()
        .starts_with("articles: "));
}

#[tokio::test]
async fn stalled_model_pipeline_hits_its_deadline_and_articles_still_run() {
    let cat = catalog();
    let news = StaticNews(vec![article("头条", "https://www.jiqizhixin.com/articles/1")]);
    let store = MemoryStore::default();

    let env = RunEnv {
        catalog: &cat,
        model_adapter: &StalledModels,
        news_adapter: &news,
        completion: completion(),
        store: &store,
        pipeline_deadline: Duration::from_millis(20),
    };
    let report = execute_run(&env, 10, 10).await;

    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("models: deadline"));
    assert_eq!(report.models.persisted, 0);
    assert_eq!(report.articles.persisted, 1);
    assert_eq!(report.status, RunStatus::Partial);
}

#[tokio::test]
async fn missing_completion_credential_fails_both_pipelines() {
    let cat = catalog();
    let models = StaticModels(vec![model("model-a")]);
    let news = StaticNews(vec![article("头条", "https://www.jiqizhixin.com/articles/1")]);
    let store = MemoryStore::default();

    let env = RunEnv {
        catalog: &cat,
        model_adapter: &models,
        news_adapter: &news,
        completion: None,
        store: &store,
        pipeline_deadline: Duration::from_secs(5),
    };
    let report = execute_run(&env, 10, 10).await;

    assert_eq!(report.errors.len(), 2);
    assert!(report.errors[0].starts_with("models: "));
    assert!(report.errors[1].starts_with("articles: "));
    assert_eq!(report.status, RunStatus::Failed);

    let runs = store.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
}

#[tokio::test]
async fn clean_run_reports_success() {
    let cat = catalog();
    let models = StaticModels(vec![model("model-a")]);
    let news = StaticNews(vec![article("头条", "https://www.jiqizhixin.com/articles/1")]);
    let store = MemoryStore::default();

    let env = RunEnv {
        catalog: &cat,
        model_adapter: &models,
        news_adapter: &news,
        completion: completion(),
        store: &store,
        pipeline_deadline: Duration::from_secs(5),
    };
    let report = execute_run(&env, 10, 10).await;

    assert!(report.errors.is_empty());
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.models.persisted, 1);
    assert_eq!(report.articles.persisted, 1);
}

#[tokio::test]
async fn run_record_write_failure_is_log_only() {
    let cat = catalog();
    let models = StaticModels(vec![model("model-a")]);
    let news = StaticNews(vec![article("头条", "https://www.jiqizhixin.com/articles/1")]);
    let store = MemoryStore {
        fail_run_insert: true,
        ..MemoryStore::default()
    };

    let env = RunEnv {
        catalog: &cat,
        model_adapter: &models,
        news_adapter: &news,
        completion: completion(),
        store: &store,
        pipeline_deadline: Duration::from_secs(5),
    };
    let report = execute_run(&env, 10, 10).await;

    assert!(report.errors.is_empty());
    assert_eq!(report.status, RunStatus::Success);
}
