// src/ingest/adapters/news.rs
// RSS news adapter: every configured feed exposes an RSS fallback endpoint;
// items become article candidates. Full-page content extraction is out of
// scope, so the item description is the only body text carried along.

use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use url::Url;

use crate::fetch::Fetcher;
use crate::ingest::{normalize_text, SourceAdapter};
use crate::records::{ArticleRecord, SourceDescriptor};
use crate::transform::dedupe_by_url;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "published")]
    published: Option<String>,
    description: Option<String>,
}

/// Resolve possibly-relative item links against the source page.
fn absolutize(link: &str, base: &str) -> String {
    match Url::parse(link) {
        Ok(u) => u.to_string(),
        Err(_) => Url::parse(base)
            .and_then(|b| b.join(link))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| link.to_string()),
    }
}

/// Parse one RSS feed into article candidates: items without a title or link
/// are skipped, duplicates collapse by normalized URL.
pub fn parse_rss(xml: &str, source: &SourceDescriptor) -> Result<Vec<ArticleRecord>> {
    let rss: Rss = from_str(xml).with_context(|| format!("parsing rss for {}", source.key))?;

    let mut records = Vec::with_capacity(rss.channel.item.len());
    for item in rss.channel.item {
        let title = normalize_text(item.title.as_deref().unwrap_or_default());
        let link = item.link.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() || link.is_empty() {
            continue;
        }
        let published_at = item
            .pub_date
            .or(item.published)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        records.push(ArticleRecord {
            title,
            source: source.name.clone(),
            url: absolutize(&link, &source.url),
            content: normalize_text(item.description.as_deref().unwrap_or_default()),
            published_at,
            ..ArticleRecord::default()
        });
    }
    Ok(dedupe_by_url(records))
}

pub struct RssNewsAdapter {
    fetcher: Fetcher,
}

impl RssNewsAdapter {
    pub fn new(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SourceAdapter<ArticleRecord> for RssNewsAdapter {
    async fn fetch(&self, source: &SourceDescriptor, limit: usize) -> Result<Vec<ArticleRecord>> {
        let xml = self.fetcher.fetch_text(source.endpoint()).await?;
        let mut records = parse_rss(&xml, source)?;
        records.truncate(limit);
        Ok(records)
    }

    fn kind(&self) -> &'static str {
        "articles"
    }
}
