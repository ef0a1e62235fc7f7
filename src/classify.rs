//! # Classifier
//! Assigns exactly one content type to a fetched item with a single
//! inference call. Never blocks the pipeline on an ambiguous answer: an
//! unrecognized label falls back to the default type.

use crate::backend::LlmBackend;
use crate::error::{Error, Result};
use crate::input::RawItem;
use crate::schema::ContentType;

/// Classification only needs the opening of the text.
const CLASSIFY_TEXT_CHARS: usize = 3000;

/// Assign one of the six content types to `item`.
///
/// Empty (post-trim) text is an `InvalidInput` error and the item must be
/// skipped by the caller. Backend failures propagate as
/// `BackendUnavailable`; an answer that matches no label maps to
/// `ContentType::fallback()` rather than failing.
pub async fn classify(backend: &dyn LlmBackend, item: &RawItem) -> Result<ContentType> {
    if item.raw_text.trim().is_empty() {
        return Err(Error::InvalidInput {
            source_url: item.source_url.clone(),
            reason: "empty raw_text".to_string(),
        });
    }

    let prompt = build_prompt(&item.raw_text);
    let response = backend.infer(&prompt).await?;

    let content_type = match match_label(&response) {
        Some(ct) => ct,
        None => {
            tracing::debug!(
                url = %item.source_url,
                answer = %response.chars().take(80).collect::<String>(),
                "unrecognized classification answer, using fallback"
            );
            ContentType::fallback()
        }
    };
    tracing::debug!(url = %item.source_url, %content_type, "classified");
    Ok(content_type)
}

fn build_prompt(raw_text: &str) -> String {
    let text: String = raw_text.chars().take(CLASSIFY_TEXT_CHARS).collect();
    let mut prompt = String::with_capacity(text.len() + 1024);
    prompt.push_str(
        "Classify this security content into exactly one category. \
         Respond with only the category label, nothing else.\n\nCategories:\n",
    );
    for ct in ContentType::ALL {
        prompt.push_str("- ");
        prompt.push_str(ct.label());
        prompt.push_str(": ");
        prompt.push_str(ct.definition());
        prompt.push('\n');
    }
    prompt.push_str("\nContent:\n");
    prompt.push_str(&text);
    prompt.push_str("\n\nCategory:");
    prompt
}

/// Normalize the model's answer (lowercase, strip punctuation, collapse
/// whitespace) and map it onto the closed label set. Spaces are accepted in
/// place of underscores.
fn match_label(response: &str) -> Option<ContentType> {
    let normalized = normalize_answer(response);
    ContentType::ALL
        .into_iter()
        .find(|ct| normalized == ct.label() || normalized == ct.label().replace('_', " "))
}

fn normalize_answer(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for ch in s.trim().chars() {
        let c = ch.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
            prev_space = false;
        } else if c.is_whitespace() || c == '-' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        }
        // other punctuation is stripped
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_labels_match() {
        for ct in ContentType::ALL {
            assert_eq!(match_label(ct.label()), Some(ct));
        }
    }

    #[test]
    fn matching_is_case_and_punctuation_insensitive() {
        assert_eq!(match_label("IOC_BASED"), Some(ContentType::IocBased));
        assert_eq!(match_label("  \"tool_analysis\".\n"), Some(ContentType::ToolAnalysis));
        assert_eq!(
            match_label("threat actor profile"),
            Some(ContentType::ThreatActorProfile)
        );
        assert_eq!(
            match_label("vulnerability-analysis"),
            Some(ContentType::VulnerabilityAnalysis)
        );
    }

    #[test]
    fn unrecognized_answers_do_not_match() {
        assert_eq!(match_label("general_news"), None);
        assert_eq!(match_label("I think this is ioc_based because..."), None);
        assert_eq!(match_label(""), None);
    }

    #[test]
    fn prompt_lists_every_label_once() {
        let prompt = build_prompt("some text");
        for ct in ContentType::ALL {
            assert_eq!(prompt.matches(ct.label()).count(), 1, "{}", ct.label());
        }
        assert!(prompt.contains("some text"));
    }

    #[test]
    fn prompt_truncates_long_text() {
        let long = "x".repeat(CLASSIFY_TEXT_CHARS + 500);
        let prompt = build_prompt(&long);
        assert!(prompt.len() < CLASSIFY_TEXT_CHARS + 1200);
    }
}
