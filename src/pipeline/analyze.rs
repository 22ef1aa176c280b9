//! Analysis Stage: transcript → summary and importance verdict.
//!
//! [`Analyzer::analyze`] cannot fail. Any problem on the way (transport
//! error, no JSON, bad JSON, a missing or ambiguous field) turns into
//! [`AnalysisResult::fallback`]: the original text, a diagnostic naming the
//! failure together with the raw model output, and `is_important = true`.
//! We know what the page says; we just could not classify it, so a human
//! gets to look.

use crate::error::ModelCallError;
use crate::model::{Channel, Message, ModelGateway, ModelRequest, SamplingParams};
use crate::output::AnalysisResult;
use crate::pipeline::json::{extract_json_object, JsonRecoveryError};
use crate::prompts::{
    ANALYSIS_SYSTEM_PROMPT, FIELD_IS_IMPORTANT, FIELD_OPTIMIZED_DETAILS,
    FIELD_TRANSCRIBED_CONTENTS,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

/// Internal reasons for falling back. Never leaves this module as an error.
#[derive(Debug, Error)]
enum AnalysisError {
    #[error("{0}")]
    Call(#[from] ModelCallError),
    #[error("could not parse analysis JSON: {0}")]
    InvalidJson(String),
    #[error("Parsed JSON is missing one or more required keys: {0}")]
    MissingFields(String),
    #[error("field '{field}' has an unusable value: {value}")]
    BadValue { field: &'static str, value: String },
}

/// The classification half of the pipeline.
#[derive(Debug, Clone)]
pub struct Analyzer {
    gateway: ModelGateway,
    model: String,
    sampling: SamplingParams,
}

impl Analyzer {
    pub fn new(gateway: ModelGateway, model: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            gateway,
            model: model.into(),
            sampling,
        }
    }

    /// Build the analysis request for a transcript.
    pub fn build_request(&self, text: &str) -> ModelRequest {
        ModelRequest {
            channel: Channel::Instruct,
            model: self.model.clone(),
            messages: vec![Message::system(ANALYSIS_SYSTEM_PROMPT), Message::user(text)],
            sampling: self.sampling,
        }
    }

    /// Analyse `text`. Always returns a well-formed result.
    pub async fn analyze(&self, text: &str) -> AnalysisResult {
        let request = self.build_request(text);
        match self.gateway.request(&request).await {
            Ok(raw) => interpret_analysis(text, &raw),
            Err(e) => {
                warn!("Analysis call failed, flagging page for review: {}", e);
                AnalysisResult::fallback(text, fallback_detail(&AnalysisError::from(e), ""))
            }
        }
    }
}

/// Turn a raw analysis response into a result, falling back on any defect.
pub fn interpret_analysis(original_text: &str, raw: &str) -> AnalysisResult {
    let raw = raw.trim();
    debug!("Raw analysis response:\n---\n{}\n---", raw);

    let object = match extract_json_object(raw) {
        Ok(object) => object,
        Err(JsonRecoveryError::NoObject) => {
            warn!("No JSON object in analysis response; using raw output as fallback");
            return AnalysisResult::fallback(
                original_text,
                format!("Analysis failed. Raw model output: {raw}"),
            );
        }
        Err(JsonRecoveryError::Invalid(detail)) => {
            let err = AnalysisError::InvalidJson(detail);
            warn!("Analysis fallback: {}", err);
            return AnalysisResult::fallback(original_text, fallback_detail(&err, raw));
        }
    };

    match validate(object) {
        Ok(result) => {
            debug!("Analysis JSON parsed and validated");
            result
        }
        Err(err) => {
            warn!("Analysis fallback: {}", err);
            AnalysisResult::fallback(original_text, fallback_detail(&err, raw))
        }
    }
}

fn fallback_detail(err: &AnalysisError, raw: &str) -> String {
    format!("Error during analysis: {err}. Raw model output: '{raw}'")
}

fn validate(mut object: Map<String, Value>) -> Result<AnalysisResult, AnalysisError> {
    let missing: Vec<&str> = [
        FIELD_TRANSCRIBED_CONTENTS,
        FIELD_OPTIMIZED_DETAILS,
        FIELD_IS_IMPORTANT,
    ]
    .into_iter()
    .filter(|f| !object.contains_key(*f))
    .collect();
    if !missing.is_empty() {
        return Err(AnalysisError::MissingFields(missing.join(", ")));
    }

    let transcribed_contents = take_string(&mut object, FIELD_TRANSCRIBED_CONTENTS)?;
    let optimized_details = take_string(&mut object, FIELD_OPTIMIZED_DETAILS)?;
    let is_important = parse_flag(object.get(FIELD_IS_IMPORTANT)).ok_or_else(|| {
        AnalysisError::BadValue {
            field: FIELD_IS_IMPORTANT,
            value: object
                .get(FIELD_IS_IMPORTANT)
                .map(Value::to_string)
                .unwrap_or_default(),
        }
    })?;

    Ok(AnalysisResult {
        transcribed_contents,
        optimized_details,
        is_important,
        fallback: false,
    })
}

fn take_string(
    object: &mut Map<String, Value>,
    field: &'static str,
) -> Result<String, AnalysisError> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        other => Err(AnalysisError::BadValue {
            field,
            value: other.map(|v| v.to_string()).unwrap_or_default(),
        }),
    }
}

/// `true`/`false`, also as case-insensitive strings. Anything else is
/// ambiguous and yields `None`.
fn parse_flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "ราคาจะซื้อจะขาย 1,980,000.00 บาท";

    #[test]
    fn well_formed_response_is_returned_verbatim() {
        let raw = format!(
            r#"{{"transcribed_contents": "{TEXT}", "optimized_details": "ราคา 1,980,000.00 บาท", "is_important": true}}"#
        );
        let r = interpret_analysis(TEXT, &raw);
        assert_eq!(r.transcribed_contents, TEXT);
        assert_eq!(r.optimized_details, "ราคา 1,980,000.00 บาท");
        assert!(r.is_important);
        assert!(!r.fallback);
    }

    #[test]
    fn false_flag_is_respected() {
        let raw = r#"Here you go:
{"transcribed_contents": "general info", "optimized_details": "ทั่วไป", "is_important": false}"#;
        let r = interpret_analysis("general info", raw);
        assert!(!r.is_important);
        assert!(!r.fallback);
    }

    #[test]
    fn missing_flag_falls_back_important() {
        let raw = r#"{"transcribed_contents": "x", "optimized_details": "y"}"#;
        let r = interpret_analysis(TEXT, raw);
        assert!(r.is_important);
        assert!(r.fallback);
        assert_eq!(r.transcribed_contents, TEXT);
        assert!(r.optimized_details.contains("is_important"));
        assert!(r.optimized_details.contains(raw));
    }

    #[test]
    fn no_json_falls_back_with_raw_output() {
        let r = interpret_analysis(TEXT, "  The document is a contract.  ");
        assert!(r.is_important);
        assert_eq!(r.transcribed_contents, TEXT);
        assert_eq!(
            r.optimized_details,
            "Analysis failed. Raw model output: The document is a contract."
        );
    }

    #[test]
    fn invalid_json_falls_back() {
        let r = interpret_analysis(TEXT, "{transcribed_contents: nope}");
        assert!(r.is_important);
        assert!(r.optimized_details.starts_with("Error during analysis:"));
    }

    #[test]
    fn string_flags_are_accepted() {
        let raw = r#"{"transcribed_contents": "a", "optimized_details": "b", "is_important": "FALSE"}"#;
        assert!(!interpret_analysis("a", raw).is_important);
    }

    #[test]
    fn ambiguous_flags_fall_back_important() {
        for flag in ["null", "0", "\"maybe\"", "[]"] {
            let raw = format!(
                r#"{{"transcribed_contents": "a", "optimized_details": "b", "is_important": {flag}}}"#
            );
            let r = interpret_analysis("a", &raw);
            assert!(r.is_important, "flag {flag}");
            assert!(r.fallback, "flag {flag}");
        }
    }

    #[test]
    fn non_string_summary_falls_back() {
        let raw = r#"{"transcribed_contents": "a", "optimized_details": ["b"], "is_important": false}"#;
        let r = interpret_analysis("a", raw);
        assert!(r.is_important);
        assert!(r.fallback);
    }
}
