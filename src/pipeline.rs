//! # Batch Driver
//! Runs classification + extraction over a batch of fetched items with full
//! per-item isolation: one unreachable backend call or malformed response
//! never stops the items behind it. Items are independent, so this loop
//! could fan out; sequential keeps output order equal to input order.

use crate::backend::LlmBackend;
use crate::classify::classify;
use crate::config::PipelineConfig;
use crate::error::Error;
use crate::extract::extract;
use crate::input::RawItem;
use crate::report::{BatchSummary, ExtractionRecord, ExtractionStatus};
use crate::schema::ContentType;
use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_total", "Items entering the pipeline.");
        describe_counter!("pipeline_records_ok_total", "Records extracted cleanly.");
        describe_counter!(
            "pipeline_records_partial_total",
            "Records with defaulted fields."
        );
        describe_counter!(
            "pipeline_records_failed_total",
            "Records with no usable data."
        );
        describe_counter!(
            "pipeline_invalid_skipped_total",
            "Items dropped before classification."
        );
    });
}

/// Everything a run produces: one record per surviving input item, plus the
/// counts the operator and the aggregator read.
#[derive(Debug)]
pub struct BatchOutcome {
    pub records: Vec<ExtractionRecord>,
    pub summary: BatchSummary,
}

/// Process a whole batch. Per-item errors become record statuses or skips;
/// this function itself never fails. The caller decides what to do when
/// `summary.all_failed()` holds.
pub async fn run_batch(
    backend: &dyn LlmBackend,
    items: &[RawItem],
    config: &PipelineConfig,
) -> BatchOutcome {
    ensure_metrics_described();
    let started_at = Utc::now();

    let capped = match config.max_items_per_batch {
        Some(cap) if items.len() > cap => {
            tracing::info!(total = items.len(), cap, "batch capped");
            &items[..cap]
        }
        _ => items,
    };
    counter!("pipeline_items_total").increment(capped.len() as u64);

    let mut records = Vec::with_capacity(capped.len());
    let mut invalid_skipped = 0usize;

    for (i, item) in capped.iter().enumerate() {
        tracing::debug!(n = i + 1, of = capped.len(), url = %item.source_url, "processing");
        match process_item(backend, item).await {
            Some(record) => records.push(record),
            None => invalid_skipped += 1,
        }
    }

    let ok = count(&records, ExtractionStatus::Ok);
    let partial = count(&records, ExtractionStatus::Partial);
    let failed = count(&records, ExtractionStatus::Failed);
    counter!("pipeline_records_ok_total").increment(ok as u64);
    counter!("pipeline_records_partial_total").increment(partial as u64);
    counter!("pipeline_records_failed_total").increment(failed as u64);
    counter!("pipeline_invalid_skipped_total").increment(invalid_skipped as u64);

    let summary = BatchSummary {
        ok,
        partial,
        failed,
        invalid_skipped,
        started_at,
        finished_at: Utc::now(),
    };
    tracing::info!(
        ok = summary.ok,
        partial = summary.partial,
        failed = summary.failed,
        invalid_skipped = summary.invalid_skipped,
        "batch finished"
    );

    BatchOutcome { records, summary }
}

/// One item, isolated. `None` means the item was invalid and produces no
/// record at all; every other outcome yields exactly one record.
async fn process_item(backend: &dyn LlmBackend, item: &RawItem) -> Option<ExtractionRecord> {
    let content_type = match classify(backend, item).await {
        Ok(ct) => ct,
        Err(e @ Error::InvalidInput { .. }) => {
            tracing::warn!(url = %item.source_url, error = %e, "item skipped");
            return None;
        }
        Err(e) => {
            // Classification failure does not stop the batch; the item is
            // passed through as a failed record under the default type.
            tracing::warn!(url = %item.source_url, error = %e, "classification failed");
            return Some(ExtractionRecord::failed(
                &item.source_url,
                ContentType::fallback(),
            ));
        }
    };

    Some(extract(backend, item, content_type).await)
}

fn count(records: &[ExtractionRecord], status: ExtractionStatus) -> usize {
    records
        .iter()
        .filter(|r| r.extraction_status == status)
        .count()
}
