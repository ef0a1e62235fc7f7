//! # Schema-Driven Extractor
//! Builds the type-specific instruction prompt, calls the backend, and runs
//! the model's answer through an explicit validate/repair state machine.
//! The core never assumes well-formed model output: a parse failure earns
//! one repair retry, then the record degrades to `failed`. Missing or
//! incoercible fields degrade to `partial` with empty defaults; safe
//! coercions (a string where a list was expected) cost nothing.

use crate::backend::{extract_json, LlmBackend};
use crate::error::Error;
use crate::input::RawItem;
use crate::report::{ExtractionRecord, ExtractionStatus};
use crate::schema::{schema_for, ContentType, FieldShape, Schema, SEVERITY_VALUES};
use serde_json::{Map, Value};

const REPAIR_INSTRUCTION: &str = "\n\nYour previous response was not valid structured output. \
     Return ONLY the JSON object, with no commentary and no markdown fences.";

/// Extract a structured record from `item` according to the schema for
/// `content_type`. Infallible at the call boundary: every failure mode is
/// folded into the record's `extraction_status`.
pub async fn extract(
    backend: &dyn LlmBackend,
    item: &RawItem,
    content_type: ContentType,
) -> ExtractionRecord {
    let schema = schema_for(content_type);
    let prompt = build_prompt(schema, item);

    // First attempt, then one repair retry on parse failure.
    let parsed = match attempt(backend, &prompt, item).await {
        Attempt::Parsed(obj) => Some(obj),
        Attempt::BackendDown => None,
        Attempt::Unparseable => {
            let repair_prompt = format!("{prompt}{REPAIR_INSTRUCTION}");
            match attempt(backend, &repair_prompt, item).await {
                Attempt::Parsed(obj) => Some(obj),
                Attempt::BackendDown => None,
                Attempt::Unparseable => {
                    // Internal only; callers see the failed record.
                    let err = Error::SchemaValidation {
                        content_type,
                        cause: "response not parseable after repair retry".to_string(),
                    };
                    tracing::warn!(url = %item.source_url, error = %err, "extraction failed");
                    None
                }
            }
        }
    };

    let Some(obj) = parsed else {
        return ExtractionRecord::failed(&item.source_url, content_type);
    };

    let (data, status) = validate(schema, obj);
    ExtractionRecord {
        source_url: item.source_url.clone(),
        content_type,
        data,
        extraction_status: status,
    }
}

enum Attempt {
    Parsed(Map<String, Value>),
    Unparseable,
    BackendDown,
}

async fn attempt(backend: &dyn LlmBackend, prompt: &str, item: &RawItem) -> Attempt {
    let response = match backend.infer(prompt).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(url = %item.source_url, error = %e, "backend call failed");
            return Attempt::BackendDown;
        }
    };
    match serde_json::from_str::<Value>(extract_json(&response)) {
        Ok(Value::Object(obj)) => Attempt::Parsed(obj),
        Ok(_) | Err(_) => Attempt::Unparseable,
    }
}

fn build_prompt(schema: &Schema, item: &RawItem) -> String {
    let mut prompt = String::with_capacity(item.raw_text.len() + 1024);
    prompt.push_str(schema.instruction);
    prompt.push_str("\n\nReturn ONLY a single JSON object with exactly these fields:\n");
    for field in schema.fields {
        prompt.push_str("- \"");
        prompt.push_str(field.name);
        prompt.push_str("\": ");
        prompt.push_str(field.shape.prompt_hint());
        prompt.push_str(" - ");
        prompt.push_str(field.hint);
        prompt.push('\n');
    }
    prompt.push_str("\nNo additional commentary, no markdown, no extra fields.\n\nSource: ");
    prompt.push_str(&item.source_url);
    prompt.push_str("\n\nContent:\n");
    prompt.push_str(&item.raw_text);
    prompt
}

/// Validation per the pipeline contract, in order: fill missing required
/// fields with empty defaults (partial), drop extraneous fields silently,
/// coerce values where safe, reset incoercible values to defaults (partial).
fn validate(schema: &Schema, mut obj: Map<String, Value>) -> (Map<String, Value>, ExtractionStatus) {
    let mut degraded = false;
    let mut data = Map::new();

    for field in schema.fields {
        let value = match obj.remove(field.name) {
            None | Some(Value::Null) => {
                degraded = true;
                field.shape.empty_default()
            }
            Some(v) => match coerce(field.shape, v) {
                Coerced::Value(v) => v,
                Coerced::ValueDegraded(v) => {
                    degraded = true;
                    v
                }
                Coerced::Incoercible => {
                    degraded = true;
                    field.shape.empty_default()
                }
            },
        };
        data.insert(field.name.to_string(), value);
    }
    // Whatever is left in `obj` is extraneous and dropped without comment.

    let status = if degraded {
        ExtractionStatus::Partial
    } else {
        ExtractionStatus::Ok
    };
    (data, status)
}

enum Coerced {
    /// Exact or safely coerced value.
    Value(Value),
    /// Usable value, but something inside was defaulted or dropped.
    ValueDegraded(Value),
    Incoercible,
}

fn coerce(shape: FieldShape, value: Value) -> Coerced {
    match shape {
        FieldShape::Text => coerce_text(value),
        FieldShape::TextList => coerce_text_list(value),
        FieldShape::Flag => coerce_flag(value),
        FieldShape::Severity => coerce_severity(value),
        FieldShape::IocSet => coerce_ioc_set(value),
    }
}

fn coerce_text(value: Value) -> Coerced {
    match value {
        Value::String(s) => Coerced::Value(Value::String(s)),
        // Scalar-to-string is safe.
        Value::Number(n) => Coerced::Value(Value::String(n.to_string())),
        Value::Bool(b) => Coerced::Value(Value::String(b.to_string())),
        _ => Coerced::Incoercible,
    }
}

fn coerce_text_list(value: Value) -> Coerced {
    match value {
        Value::Array(items) => {
            let len = items.len();
            let strings: Vec<Value> = items
                .into_iter()
                .filter_map(|v| match coerce_text(v) {
                    Coerced::Value(s) => Some(s),
                    _ => None,
                })
                .collect();
            if strings.len() == len {
                Coerced::Value(Value::Array(strings))
            } else {
                // Non-scalar entries dropped.
                Coerced::ValueDegraded(Value::Array(strings))
            }
        }
        // A single string where a list was expected becomes a one-element list.
        Value::String(s) => Coerced::Value(Value::Array(vec![Value::String(s)])),
        _ => Coerced::Incoercible,
    }
}

fn coerce_flag(value: Value) -> Coerced {
    match value {
        Value::Bool(b) => Coerced::Value(Value::Bool(b)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Coerced::Value(Value::Bool(true)),
            "false" | "no" => Coerced::Value(Value::Bool(false)),
            _ => Coerced::Incoercible,
        },
        _ => Coerced::Incoercible,
    }
}

fn coerce_severity(value: Value) -> Coerced {
    match value {
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            if SEVERITY_VALUES.contains(&lowered.as_str()) {
                Coerced::Value(Value::String(lowered))
            } else {
                Coerced::Incoercible
            }
        }
        _ => Coerced::Incoercible,
    }
}

/// Normalize the nested IOC mapping to its full shape. Missing groups are
/// filled with empty lists; unknown groups (urls, file_names, ...) are
/// dropped like any other extraneous field.
fn coerce_ioc_set(value: Value) -> Coerced {
    let Value::Object(mut obj) = value else {
        return Coerced::Incoercible;
    };
    let mut degraded = false;
    let mut out = Map::new();

    for group in ["ips", "domains"] {
        let list = match obj.remove(group) {
            None | Some(Value::Null) => Value::Array(vec![]),
            Some(v) => match coerce_text_list(v) {
                Coerced::Value(v) => v,
                Coerced::ValueDegraded(v) => {
                    degraded = true;
                    v
                }
                Coerced::Incoercible => {
                    degraded = true;
                    Value::Array(vec![])
                }
            },
        };
        out.insert(group.to_string(), list);
    }

    let mut hashes = Map::new();
    let mut hash_obj = match obj.remove("hashes") {
        Some(Value::Object(m)) => m,
        None | Some(Value::Null) => Map::new(),
        Some(_) => {
            degraded = true;
            Map::new()
        }
    };
    for algo in ["md5", "sha1", "sha256"] {
        let list = match hash_obj.remove(algo) {
            None | Some(Value::Null) => Value::Array(vec![]),
            Some(v) => match coerce_text_list(v) {
                Coerced::Value(v) => v,
                Coerced::ValueDegraded(v) => {
                    degraded = true;
                    v
                }
                Coerced::Incoercible => {
                    degraded = true;
                    Value::Array(vec![])
                }
            },
        };
        hashes.insert(algo.to_string(), list);
    }
    out.insert("hashes".to_string(), Value::Object(hashes));

    if degraded {
        Coerced::ValueDegraded(Value::Object(out))
    } else {
        Coerced::Value(Value::Object(out))
    }
}
