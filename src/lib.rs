// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod backend;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod input;
pub mod pipeline;
pub mod report;
pub mod schema;

// ---- Re-exports for stable public API ----
pub use crate::backend::{build_backend, DynBackend, LlmBackend};
pub use crate::config::PipelineConfig;
pub use crate::error::{Error, Result};
pub use crate::input::{load_items, RawItem, SourceKind};
pub use crate::pipeline::{run_batch, BatchOutcome};
pub use crate::report::{BatchSummary, ExtractionRecord, ExtractionStatus};
pub use crate::schema::{schema_for, ContentType, FieldShape, Schema};
