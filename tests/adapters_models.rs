// tests/adapters_models.rs
// Payload mapping for the model-catalog sources, on fixtures.

use serde_json::json;

use ai_radar_crawler::ingest::adapters::models::{
    litellm_seed, map_huggingface, map_openrouter, safe_cost,
};
use ai_radar_crawler::records::SourceDescriptor;

fn openrouter_source() -> SourceDescriptor {
    SourceDescriptor::new(
        "openrouter",
        "OpenRouter",
        "https://openrouter.ai/models",
        Some("https://openrouter.ai/api/v1/models"),
    )
}

#[test]
fn openrouter_payload_maps_names_pricing_and_urls() {
    let payload = json!({
        "data": [
            {
                "id": "acme/model-a",
                "name": "Model A",
                "description": "desc",
                "pricing": {"prompt": "0.000002", "completion": 0.000004},
                "architecture": {"modality": "text+image->text"}
            },
            {"id": "acme/model-b", "pricing": {}},
            {"pricing": {}}
        ]
    });
    let records = map_openrouter(&payload, &openrouter_source(), 10).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "Model A");
    assert_eq!(records[0].provider, "OpenRouter");
    // Sub-cent per-token prices scale to per-million terms.
    assert_eq!(records[0].cost_input, Some(2.0));
    assert_eq!(records[0].cost_output, Some(4.0));
    assert_eq!(records[0].business_scenarios, vec!["多模态"]);
    assert_eq!(
        records[0].source_url,
        "https://openrouter.ai/models/acme/model-a"
    );
    // Second row falls back to its id as the name.
    assert_eq!(records[1].name, "acme/model-b");
}

#[test]
fn openrouter_rejects_shapeless_payload() {
    let payload = json!({"unexpected": true});
    assert!(map_openrouter(&payload, &openrouter_source(), 10).is_err());
}

#[test]
fn openrouter_respects_limit() {
    let rows: Vec<_> = (0..10)
        .map(|i| json!({"id": format!("m{i}"), "name": format!("Model {i}")}))
        .collect();
    let payload = json!({ "data": rows });
    let records = map_openrouter(&payload, &openrouter_source(), 3).unwrap();
    assert_eq!(records.len(), 3);
}

#[test]
fn huggingface_payload_maps_pipeline_tags_to_scenarios() {
    let payload = json!([
        {"id": "org/qa-model", "pipeline_tag": "question-answering"},
        {"id": "org/asr-model", "pipeline_tag": "automatic-speech-recognition"},
        {"id": "org/other-model"},
        {"pipeline_tag": "text-generation"}
    ]);
    let records = map_huggingface(&payload, 10).unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].business_scenarios, vec!["知识问答"]);
    assert_eq!(records[1].business_scenarios, vec!["语音处理"]);
    // Unknown pipeline tags default to content generation.
    assert_eq!(records[2].business_scenarios, vec!["内容生成"]);
    assert_eq!(records[2].description, "pipeline=unknown");
    assert_eq!(records[0].source_url, "https://huggingface.co/org/qa-model");
}

#[test]
fn huggingface_rejects_non_array_payload() {
    assert!(map_huggingface(&json!({"data": []}), 10).is_err());
}

#[test]
fn litellm_seed_respects_limit() {
    let source = SourceDescriptor::new("litellm", "LiteLLM", "https://litellm.ai", None);
    let records = litellm_seed(&source, 2);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.provider == "LiteLLM"));
    assert!(records.iter().all(|r| r.source_url == "https://litellm.ai"));
}

#[test]
fn safe_cost_handles_currency_strings_and_scaling() {
    assert_eq!(safe_cost(&json!("$1,234.5")), Some(1234.5));
    assert_eq!(safe_cost(&json!(0.000003)), Some(3.0));
    assert_eq!(safe_cost(&json!(0.5)), Some(0.5));
    assert_eq!(safe_cost(&json!(-1.0)), None);
    assert_eq!(safe_cost(&json!("free")), None);
    assert_eq!(safe_cost(&json!(null)), None);
}
