//! # Extraction Records & Persistence
//! Output boundary of the pipeline. Records are persisted as one JSON array
//! whose shape the report renderer consumes without any content-type logic
//! beyond branching on `content_type`.

use crate::schema::ContentType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

/// How much of an extraction survived validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    /// Every required field present and correctly typed.
    Ok,
    /// Some fields defaulted; still useful to an analyst.
    Partial,
    /// Nothing usable; `data` is empty.
    Failed,
}

/// The pipeline's output unit. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub source_url: String,
    pub content_type: ContentType,
    /// Keys are exactly the schema's required fields; `{}` when failed.
    pub data: Map<String, Value>,
    pub extraction_status: ExtractionStatus,
}

impl ExtractionRecord {
    /// A `failed` record with empty data, produced when the backend is
    /// unreachable or the response never parsed.
    pub fn failed(source_url: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            source_url: source_url.into(),
            content_type,
            data: Map::new(),
            extraction_status: ExtractionStatus::Failed,
        }
    }
}

/// Per-batch result counts, reported to the aggregator and the operator so
/// they can tell how much of the report is trustworthy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
    /// Items dropped before classification (empty text).
    pub invalid_skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn total_records(&self) -> usize {
        self.ok + self.partial + self.failed
    }

    /// Catastrophic condition: records were produced but not one of them
    /// carries data. The binary aborts on this after the whole batch ran.
    pub fn all_failed(&self) -> bool {
        self.total_records() > 0 && self.ok == 0 && self.partial == 0
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp: PathBuf = path.with_extension("json.tmp");
    let mut f = std::fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

/// Persist the record array. Written atomically (tmp + rename) so a crashed
/// run never leaves a half-written report input behind.
pub fn write_records(path: &Path, records: &[ExtractionRecord]) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(records)?;
    atomic_write(path, &json)?;
    tracing::info!(path = %path.display(), count = records.len(), "records written");
    Ok(())
}

/// Write the batch summary next to the records file (`<stem>_summary.json`).
pub fn write_summary(records_path: &Path, summary: &BatchSummary) -> anyhow::Result<PathBuf> {
    let stem = records_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("records");
    let path = records_path.with_file_name(format!("{stem}_summary.json"));
    let json = serde_json::to_vec_pretty(summary)?;
    atomic_write(&path, &json)?;
    Ok(path)
}
