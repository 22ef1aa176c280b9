//! Recover a JSON object from free-form model output.
//!
//! Models asked for "only JSON" still wrap it in prose, code fences, or
//! trailing remarks. A greedy `\{.*\}` regex runs to the last `}` in the
//! text and swallows any trailing remark that contains a brace, so the text
//! is walked with an explicit brace-depth counter instead:
//!
//! 1. Candidates are top-level spans, found left to right.
//! 2. From a `{`, depth goes up on `{` and down on `}`; braces inside JSON
//!    string literals (with `\"` escapes) do not count.
//! 3. The candidate ends where depth returns to zero, and the next candidate
//!    is searched for after that end. Objects nested inside a candidate are
//!    never candidates themselves, so a malformed response cannot yield one
//!    of its inner objects.
//! 4. A `{` that never balances is skipped and the search resumes after it.
//! 5. The first candidate that parses as a JSON object wins.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why no object could be recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsonRecoveryError {
    /// No balanced `{...}` span exists in the text.
    #[error("no JSON object found in the model's response")]
    NoObject,
    /// Balanced spans exist but none is a valid JSON object; holds the error
    /// for the first span.
    #[error("invalid JSON object: {0}")]
    Invalid(String),
}

/// Byte range of the balanced span starting at `start` (which must be `{`).
fn balanced_span(text: &str, start: usize) -> Option<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some((start, start + offset + 1));
                }
            }
            _ => {}
        }
    }
    None
}

/// Every top-level balanced `{...}` candidate, left to right. Candidates
/// never overlap.
pub fn candidate_spans(text: &str) -> impl Iterator<Item = &str> + '_ {
    let mut cursor = 0;
    std::iter::from_fn(move || {
        while let Some(offset) = text[cursor..].find('{') {
            let start = cursor + offset;
            match balanced_span(text, start) {
                Some((s, e)) => {
                    cursor = e;
                    return Some(&text[s..e]);
                }
                None => cursor = start + 1,
            }
        }
        None
    })
}

/// The first balanced span, parsed or not.
pub fn first_object_span(text: &str) -> Option<&str> {
    candidate_spans(text).next()
}

/// Recover the first parseable JSON object from `text`.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, JsonRecoveryError> {
    let mut first_error: Option<String> = None;

    for span in candidate_spans(text) {
        match serde_json::from_str::<Value>(span) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => {}
            Err(e) => {
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    match first_error {
        Some(e) => Err(JsonRecoveryError::Invalid(e)),
        None => Err(JsonRecoveryError::NoObject),
    }
}
