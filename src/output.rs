//! Result types produced by the pipeline.

use crate::error::PageError;
use serde::{Deserialize, Serialize};

/// Output of the Transcription Stage for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub natural_text: String,
}

/// Output of the Analysis Stage.
///
/// `is_important` is never absent. Whenever the model's answer cannot be
/// trusted it is `true`, so the page goes to a human instead of being
/// silently filed as routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// The model's echo of the input text. Best-effort; do not assume it is
    /// byte-identical to what was sent.
    pub transcribed_contents: String,
    /// Short Thai summary keeping figures, dates and identifiers.
    pub optimized_details: String,
    pub is_important: bool,
    /// `true` when this value was synthesised because analysis failed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl AnalysisResult {
    /// The fail-safe result: original text, a diagnostic, flagged important.
    pub fn fallback(original_text: &str, diagnostic: String) -> Self {
        Self {
            transcribed_contents: original_text.to_string(),
            optimized_details: diagnostic,
            is_important: true,
            fallback: true,
        }
    }
}

/// The final structured record for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-based position in the source document.
    pub page_number: usize,
    /// Transcribed page text, or an error message when transcription failed.
    pub analyze_contents: String,
    pub optimized_details: String,
    pub is_important: bool,
    /// Set when the page could not be transcribed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageRecord {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate counters for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the document (== number of records).
    pub total_pages: usize,
    /// Pages whose text was recovered.
    pub transcribed_pages: usize,
    /// Pages that carry an error record.
    pub failed_pages: usize,
    /// Records flagged for review, failures included.
    pub important_pages: usize,
    /// Analysis results that were synthesised fallbacks.
    pub analysis_fallbacks: usize,
    /// Model calls answered from the response cache during this run.
    pub cache_hits: u64,
    /// Model calls that went to the network during this run.
    pub cache_misses: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything returned by [`crate::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub records: Vec<PageRecord>,
    pub stats: ExtractionStats,
}
