// src/error.rs
// Per-item error taxonomy. Nothing here escapes a batch run: the pipeline
// converts every variant into a record status or a skip.

use thiserror::Error;

use crate::schema::ContentType;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or empty fetched item. The item is logged and dropped;
    /// it never reaches extraction and never appears in the output.
    #[error("invalid input for {source_url}: {reason}")]
    InvalidInput { source_url: String, reason: String },

    /// Network, timeout, or auth failure talking to the LLM backend.
    /// Downgrades the item to a `failed` record with empty data.
    #[error("backend '{backend}' unavailable: {cause}")]
    BackendUnavailable { backend: &'static str, cause: String },

    /// Model output did not match the schema even after the repair retry.
    /// Internal only: callers see a `failed` record, never this error.
    #[error("response for {content_type} failed schema validation: {cause}")]
    SchemaValidation {
        content_type: ContentType,
        cause: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for variants that count against the backend in the batch summary.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Error::BackendUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_compact_and_actionable() {
        let e = Error::BackendUnavailable {
            backend: "ollama",
            cause: "connection refused".into(),
        };
        assert_eq!(
            e.to_string(),
            "backend 'ollama' unavailable: connection refused"
        );
        assert!(e.is_backend_failure());

        let e = Error::InvalidInput {
            source_url: "https://x.com/a/1".into(),
            reason: "empty text".into(),
        };
        assert!(!e.is_backend_failure());
    }
}
