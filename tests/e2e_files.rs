// tests/e2e_files.rs
// File-to-file smoke run: fetched-content JSON in, record array out.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;

use ttp_intel_pipeline::{
    load_items, report, run_batch, Error, ExtractionRecord, ExtractionStatus, LlmBackend,
    PipelineConfig, SourceKind,
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

#[tokio::test]
async fn fetched_file_to_records_file() {
    let tmp = tempfile::tempdir().unwrap();

    // What the fetch step writes: tweets and articles, one empty, one dup.
    let fetched = json!([
        {
            "source": "twitter",
            "url": "https://x.com/a/1",
            "content": "CVE-2024-99999 exploited in the wild, patch now",
            "timestamp": "2025-11-02T08:00:00Z"
        },
        {
            "source": "thedfirreport",
            "url": "https://blog.test/post",
            "content": "<p>Long-form intrusion report</p>",
            "timestamp": null
        },
        { "source": "twitter", "url": "https://x.com/a/2", "content": "   " },
        { "source": "twitter", "url": "https://x.com/a/1", "content": "duplicate url" }
    ]);
    let input_path = tmp.path().join("content_20251102.json");
    std::fs::write(&input_path, serde_json::to_string_pretty(&fetched).unwrap()).unwrap();

    let items = load_items(&input_path).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].source_kind, SourceKind::Tweet);
    assert_eq!(items[1].source_kind, SourceKind::Article);
    assert_eq!(items[1].raw_text, "Long-form intrusion report");

    let vuln = json!({
        "cve_id": "CVE-2024-99999",
        "severity": "critical",
        "exploit_available": true,
        "affected_products": "Widget Server 3.x",
        "mitigation": "apply vendor patch",
    })
    .to_string();
    let backend = ScriptedBackend::new(vec![
        Ok("vulnerability_analysis"),
        Ok(&vuln),
        Err(()), // the article's classification call fails
    ]);

    let outcome = run_batch(&backend, &items, &PipelineConfig::default()).await;
    assert_eq!(outcome.records.len(), 2);

    let out_path = tmp.path().join("records.json");
    report::write_records(&out_path, &outcome.records).unwrap();
    let summary_path = report::write_summary(&out_path, &outcome.summary).unwrap();
    assert!(summary_path.ends_with("records_summary.json"));

    let back: Vec<ExtractionRecord> =
        serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(back.len(), 2);

    // Single string coerced into a one-element list, everything else clean.
    let vuln_rec = &back[0];
    assert_eq!(vuln_rec.extraction_status, ExtractionStatus::Ok);
    assert_eq!(
        vuln_rec.data["affected_products"],
        json!(["Widget Server 3.x"])
    );

    let failed_rec = &back[1];
    assert_eq!(failed_rec.extraction_status, ExtractionStatus::Failed);
    assert!(failed_rec.data.is_empty());
}
