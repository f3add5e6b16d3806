// src/enrich/tags.rs
// Controlled vocabulary for business-scenario tags. Free-text tags coming
// back from the completion endpoint are mapped into this vocabulary or
// dropped; nothing outside it is ever persisted.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Canonical tag → trigger words for substring matching. Order matters:
/// earlier entries win when several keywords match.
pub static TAG_KEYWORDS: Lazy<Vec<(&'static str, &'static [&'static str])>> = Lazy::new(|| {
    vec![
        ("知识问答", &["知识库", "问答", "rag", "检索"][..]),
        ("自动化工作流", &["agent", "流程", "自动化", "编排"][..]),
        ("决策辅助", &["分析", "策略", "决策", "roi"][..]),
        ("客服对话", &["客服", "对话", "聊天", "机器人"][..]),
        ("代码辅助", &["代码", "编程", "review", "debug"][..]),
        ("多模态", &["图文", "多模态", "视频", "语音"][..]),
        ("数据分析", &["报表", "数据", "指标", "洞察"][..]),
    ]
});

/// Canonical labels without trigger words; only reachable verbatim or via an
/// alias.
const EXTRA_CANONICAL: &[&str] = &["内容生成", "文档处理", "图像处理", "语音处理"];

static TAG_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("企业知识管理", "知识问答"),
        ("智能客服", "客服对话"),
        ("数据分析洞察", "数据分析"),
        ("商业分析", "决策辅助"),
    ])
});

pub fn is_canonical(tag: &str) -> bool {
    TAG_KEYWORDS.iter().any(|(canonical, _)| *canonical == tag)
        || EXTRA_CANONICAL.contains(&tag)
}

/// Map one free-text tag into the vocabulary: verbatim, then alias, then
/// keyword substring, else `None`.
pub fn normalize_tag(tag: &str) -> Option<&'static str> {
    let clean = tag.trim();
    if clean.is_empty() {
        return None;
    }
    if let Some((canonical, _)) = TAG_KEYWORDS.iter().find(|(c, _)| *c == clean) {
        return Some(canonical);
    }
    if let Some(extra) = EXTRA_CANONICAL.iter().find(|c| **c == clean) {
        return Some(extra);
    }
    if let Some(alias) = TAG_ALIASES.get(clean) {
        return Some(alias);
    }
    let lowered = clean.to_lowercase();
    TAG_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lowered.contains(w)))
        .map(|(canonical, _)| *canonical)
}

/// Canonicalize a tag list: unmapped tags dropped, order-preserving dedup,
/// at most three survivors. May come back empty; the caller decides whether
/// that is fatal.
pub fn canonicalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = Vec::new();
    for tag in tags {
        if let Some(canonical) = normalize_tag(tag.as_ref()) {
            if !seen.iter().any(|s| s == canonical) {
                seen.push(canonical.to_string());
            }
        }
        if seen.len() == 3 {
            break;
        }
    }
    seen
}
