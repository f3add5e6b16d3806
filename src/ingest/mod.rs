// src/ingest/mod.rs
// Ingestion orchestration. Each configured source is attempted in order and
// failures stay isolated to their source: the batch only comes back empty if
// every source fails, and even that is a normal outcome, not an error.

pub mod adapters;

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::records::SourceDescriptor;

/// Per-kind source adapter: turns one source descriptor into candidate
/// records. May fail on transport or payload-shape problems; the caller
/// isolates that failure.
#[async_trait]
pub trait SourceAdapter<R>: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor, limit: usize) -> Result<Vec<R>>;
    /// Record-kind name for diagnostics.
    fn kind(&self) -> &'static str;
}

/// One failed source, kept for the report instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    pub source_key: String,
    pub message: String,
}

#[derive(Debug)]
pub struct IngestOutcome<R> {
    pub records: Vec<R>,
    pub sources_attempted: usize,
    pub source_errors: Vec<SourceError>,
}

/// Run the adapter over every source, concatenating successes in source
/// order and collecting per-source errors.
pub async fn ingest<R>(
    adapter: &dyn SourceAdapter<R>,
    sources: &[SourceDescriptor],
    limit: usize,
) -> IngestOutcome<R> {
    let mut records = Vec::new();
    let mut source_errors = Vec::new();

    for source in sources {
        match adapter.fetch(source, limit).await {
            Ok(batch) => {
                info!(
                    kind = adapter.kind(),
                    source = %source.key,
                    fetched = batch.len(),
                    "source ingested"
                );
                records.extend(batch);
            }
            Err(error) => {
                warn!(
                    kind = adapter.kind(),
                    source = %source.key,
                    error = %error,
                    "source failed, continuing"
                );
                source_errors.push(SourceError {
                    source_key: source.key.clone(),
                    message: format!("{error:#}"),
                });
            }
        }
    }

    IngestOutcome {
        records,
        sources_attempted: sources.len(),
        source_errors,
    }
}

/// Normalize scraped text: decode HTML entities, strip tags, collapse
/// whitespace.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let stripped = re_tags.replace_all(&decoded, " ");

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
