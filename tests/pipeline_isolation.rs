// tests/pipeline_isolation.rs
// One item's backend failure or garbage output must never affect its
// neighbors, and re-running with the same deterministic backend must give
// the same shapes.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;

use ttp_intel_pipeline::{
    run_batch, schema_for, ContentType, Error, ExtractionStatus, LlmBackend, PipelineConfig,
    RawItem, SourceKind,
};

struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, ()>>>,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<&str, ()>>) -> Self {
        Self {
            script: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.map(str::to_string))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn infer(&self, _prompt: &str) -> Result<String, Error> {
        match self.script.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(())) | None => Err(Error::BackendUnavailable {
                backend: "scripted",
                cause: "scripted failure".to_string(),
            }),
        }
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn item(url: &str, text: &str) -> RawItem {
    RawItem {
        source_url: url.to_string(),
        source_kind: SourceKind::Article,
        raw_text: text.to_string(),
        captured_at: Utc::now(),
    }
}

fn technique_json() -> String {
    json!({
        "technique_name": "BYOVD",
        "detection_gap": "signed drivers evade allowlists",
        "detection_ideas": ["driver load telemetry"],
        "key_takeaway": "block known-bad drivers",
    })
    .to_string()
}

#[tokio::test]
async fn backend_failure_on_one_item_spares_the_rest() {
    let good = technique_json();
    let backend = ScriptedBackend::new(vec![
        Err(()), // classification of item 1 fails
        Ok("technique_research"),
        Ok(&good),
    ]);

    let items = vec![
        item("https://blog.test/1", "first article"),
        item("https://blog.test/2", "second article about BYOVD"),
    ];
    let outcome = run_batch(&backend, &items, &PipelineConfig::default()).await;

    // Every non-invalid input yields exactly one record.
    assert_eq!(outcome.records.len(), 2);

    let failed = &outcome.records[0];
    assert_eq!(failed.extraction_status, ExtractionStatus::Failed);
    assert!(failed.data.is_empty());

    let ok = &outcome.records[1];
    assert_eq!(ok.extraction_status, ExtractionStatus::Ok);
    assert_eq!(ok.content_type, ContentType::TechniqueResearch);

    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(outcome.summary.ok, 1);
    assert!(!outcome.summary.all_failed());
}

#[tokio::test]
async fn malformed_output_twice_yields_failed_record() {
    let backend = ScriptedBackend::new(vec![
        Ok("detection_engineering"),
        Ok("Sure! Here's what I found: it's a great detection"),
        Ok("sorry, I meant: still not json"),
    ]);

    let items = vec![item("https://blog.test/3", "a Sigma rule writeup")];
    let outcome = run_batch(&backend, &items, &PipelineConfig::default()).await;

    assert_eq!(outcome.records.len(), 1);
    let rec = &outcome.records[0];
    assert_eq!(rec.extraction_status, ExtractionStatus::Failed);
    assert!(rec.data.is_empty());
    assert_eq!(rec.content_type, ContentType::DetectionEngineering);
    assert!(outcome.summary.all_failed());
}

#[tokio::test]
async fn malformed_then_repaired_output_recovers() {
    let good = json!({
        "detection_logic": "sequence by host [process where ...]",
        "data_sources": ["process events"],
        "false_positive_notes": "medium, tune per fleet",
    })
    .to_string();
    let fenced = format!("```json\n{good}\n```");
    let backend = ScriptedBackend::new(vec![
        Ok("detection_engineering"),
        Ok("not json at all"),
        Ok(&fenced), // repair retry succeeds, fences and all
    ]);

    let items = vec![item("https://blog.test/4", "EQL detection writeup")];
    let outcome = run_batch(&backend, &items, &PipelineConfig::default()).await;

    let rec = &outcome.records[0];
    assert_eq!(rec.extraction_status, ExtractionStatus::Ok);
    assert_eq!(rec.data["data_sources"], json!(["process events"]));
}

#[tokio::test]
async fn rerun_with_same_backend_yields_same_shapes() {
    let items = vec![item("https://blog.test/5", "BYOVD research")];
    let config = PipelineConfig::default();

    let mut shapes = Vec::new();
    for _ in 0..2 {
        let good = technique_json();
        let backend = ScriptedBackend::new(vec![Ok("technique_research"), Ok(&good)]);
        let outcome = run_batch(&backend, &items, &config).await;
        let rec = &outcome.records[0];
        let mut keys: Vec<String> = rec.data.keys().cloned().collect();
        keys.sort();
        shapes.push((rec.content_type, rec.extraction_status, keys));
    }
    assert_eq!(shapes[0], shapes[1]);

    // And the validated key set is exactly the schema's required fields.
    let schema = schema_for(shapes[0].0);
    let mut required: Vec<String> = schema.fields.iter().map(|f| f.name.to_string()).collect();
    required.sort();
    assert_eq!(shapes[0].2, required);
}
