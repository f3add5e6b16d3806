// src/transform.rs
// URL and model-name canonicalization plus first-occurrence-wins dedup.
// These are the dedup keys for the whole pipeline: raw inputs differing only
// by case, punctuation, or tracking parameters must collapse to one key.

use std::collections::HashSet;

use url::form_urlencoded;
use url::Url;

use crate::records::{ArticleRecord, ModelRecord};

/// Query keys that never contribute to article identity.
const TRACKING_QUERY_KEYS: &[&str] = &["spm", "from", "from_source"];

fn is_tracking_key(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_QUERY_KEYS.contains(&key)
}

/// Canonicalize a URL into its dedup key. Pure and total: malformed input
/// yields a best-effort string instead of an error.
///
/// Scheme and host are lowercased (scheme defaults to https), trailing
/// slashes are stripped from the path, tracking parameters are removed, the
/// remaining query is re-encoded in its original order, and the fragment is
/// dropped.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(u) if u.has_host() => u,
        // Scheme-less input like "a.com/path": retry with the default scheme.
        _ => match Url::parse(&format!("https://{trimmed}")) {
            Ok(u) if u.has_host() => u,
            _ => return trimmed.to_string(),
        },
    };

    let mut out = format!(
        "{}://{}",
        parsed.scheme().to_ascii_lowercase(),
        parsed.host_str().unwrap_or_default().to_ascii_lowercase()
    );
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{port}"));
    }

    out.push_str(parsed.path().trim_end_matches('/'));

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_key(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !kept.is_empty() {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        out.push('?');
        out.push_str(&query);
    }

    out
}

/// Case- and punctuation-insensitive model name key: lowercase, `_`/`-`
/// become spaces, runs of whitespace collapse to one.
pub fn normalize_model_name(raw: &str) -> String {
    let lowered = raw.to_lowercase().replace(['_', '-'], " ");
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse articles sharing a normalized URL; first occurrence wins and
/// keeps the canonical URL. Records with an empty URL are dropped.
/// Idempotent: applying it twice equals applying it once.
pub fn dedupe_by_url(items: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        if item.url.trim().is_empty() {
            continue;
        }
        let url = normalize_url(&item.url);
        if !seen.insert(url.clone()) {
            continue;
        }
        result.push(ArticleRecord { url, ..item });
    }
    result
}

/// Collapse models sharing `(provider, normalized name)`; first wins.
/// Records with an empty provider or name are dropped.
pub fn dedupe_models(items: Vec<ModelRecord>) -> Vec<ModelRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        let provider = item.provider.trim().to_lowercase();
        let name = normalize_model_name(&item.name);
        if provider.is_empty() || name.is_empty() {
            continue;
        }
        if !seen.insert((provider, name)) {
            continue;
        }
        result.push(item);
    }
    result
}
