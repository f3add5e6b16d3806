// tests/tags.rs
use ai_radar_crawler::enrich::tags::{canonicalize_tags, is_canonical, normalize_tag};

#[test]
fn canonical_tags_pass_verbatim() {
    assert_eq!(normalize_tag("知识问答"), Some("知识问答"));
    assert_eq!(normalize_tag("内容生成"), Some("内容生成"));
}

#[test]
fn aliases_resolve_to_fixed_labels() {
    assert_eq!(normalize_tag("企业知识管理"), Some("知识问答"));
    assert_eq!(normalize_tag("智能客服"), Some("客服对话"));
    assert_eq!(normalize_tag("数据分析洞察"), Some("数据分析"));
    assert_eq!(normalize_tag("商业分析"), Some("决策辅助"));
}

#[test]
fn keyword_substring_matches_case_insensitively() {
    assert_eq!(normalize_tag("RAG 检索增强"), Some("知识问答"));
    assert_eq!(normalize_tag("Agent 编排平台"), Some("自动化工作流"));
    assert_eq!(normalize_tag("代码 Review 工具"), Some("代码辅助"));
}

#[test]
fn unknown_tags_are_dropped() {
    assert_eq!(normalize_tag("量子计算"), None);
    assert_eq!(normalize_tag(""), None);
    assert_eq!(normalize_tag("   "), None);
}

#[test]
fn canonicalize_dedups_preserving_order_and_truncates() {
    let raw = vec![
        "智能客服",     // -> 客服对话
        "客服对话",     // duplicate after aliasing
        "企业知识管理", // -> 知识问答
        "量子计算",     // dropped
        "内容生成",
        "文档处理", // fourth unique, truncated
    ];
    let result = canonicalize_tags(&raw);
    assert_eq!(result, vec!["客服对话", "知识问答", "内容生成"]);
}

#[test]
fn canonicalize_can_come_back_empty() {
    let raw = vec!["量子计算", "区块链"];
    assert!(canonicalize_tags(&raw).is_empty());
}

#[test]
fn every_alias_target_is_canonical() {
    for alias in ["企业知识管理", "智能客服", "数据分析洞察", "商业分析"] {
        let target = normalize_tag(alias).unwrap();
        assert!(is_canonical(target));
    }
}
