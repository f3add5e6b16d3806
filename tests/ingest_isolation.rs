// tests/ingest_isolation.rs
// One failing source must not abort the batch: the outcome is the
// concatenation of the other sources' results plus a recorded error.

use anyhow::{bail, Result};
use async_trait::async_trait;

use ai_radar_crawler::ingest::{ingest, SourceAdapter};
use ai_radar_crawler::records::{ArticleRecord, SourceDescriptor};

struct FlakyAdapter {
    failing_key: &'static str,
}

#[async_trait]
impl SourceAdapter<ArticleRecord> for FlakyAdapter {
    async fn fetch(&self, source: &SourceDescriptor, limit: usize) -> Result<Vec<ArticleRecord>> {
        if source.key == self.failing_key {
            bail!("connection reset by peer");
        }
        Ok((0..limit)
            .map(|i| ArticleRecord {
                title: format!("{}-{i}", source.key),
                source: source.name.clone(),
                url: format!("https://{}.example.com/{i}", source.key),
                ..ArticleRecord::default()
            })
            .collect())
    }

    fn kind(&self) -> &'static str {
        "articles"
    }
}

fn sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor::new("s1", "One", "https://s1.example.com", None),
        SourceDescriptor::new("s2", "Two", "https://s2.example.com", None),
        SourceDescriptor::new("s3", "Three", "https://s3.example.com", None),
    ]
}

#[tokio::test]
async fn failing_source_is_isolated() {
    let adapter = FlakyAdapter { failing_key: "s2" };
    let outcome = ingest(&adapter, &sources(), 2).await;

    assert_eq!(outcome.sources_attempted, 3);
    assert_eq!(outcome.records.len(), 4);
    // Source input order is preserved across the concatenation.
    assert_eq!(outcome.records[0].title, "s1-0");
    assert_eq!(outcome.records[2].title, "s3-0");

    assert_eq!(outcome.source_errors.len(), 1);
    assert_eq!(outcome.source_errors[0].source_key, "s2");
    assert!(outcome.source_errors[0].message.contains("connection reset"));
}

#[tokio::test]
async fn all_sources_failing_yields_empty_batch_not_error() {
    struct AlwaysFails;

    #[async_trait]
    impl SourceAdapter<ArticleRecord> for AlwaysFails {
        async fn fetch(
            &self,
            _source: &SourceDescriptor,
            _limit: usize,
        ) -> Result<Vec<ArticleRecord>> {
            bail!("boom");
        }
        fn kind(&self) -> &'static str {
            "articles"
        }
    }

    let outcome = ingest(&AlwaysFails, &sources(), 2).await;
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.source_errors.len(), 3);
}

#[tokio::test]
async fn no_sources_is_a_clean_noop() {
    let adapter = FlakyAdapter { failing_key: "none" };
    let outcome = ingest(&adapter, &[], 5).await;
    assert_eq!(outcome.sources_attempted, 0);
    assert!(outcome.records.is_empty());
    assert!(outcome.source_errors.is_empty());
}
