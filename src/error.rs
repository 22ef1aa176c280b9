//! Error types for the pdf2records library.
//!
//! Failures fall into three tiers, matching how far they are allowed to
//! travel:
//!
//! * [`ExtractError`]: **fatal**: the document cannot be processed at all
//!   (missing file, not a PDF, wrong password, pdfium unavailable). Returned as
//!   `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`PageError`]: **non-fatal**: one page could not be transcribed. It is
//!   rendered into that page's [`crate::output::PageRecord`] and the batch
//!   carries on with the next page.
//!
//! * Stage errors ([`TranscriptionError`], [`ModelCallError`],
//!   [`PersistenceError`]) are produced inside the pipeline and translated at
//!   the stage boundary: transcription failures become a [`PageError`],
//!   analysis failures become a fail-safe result, persistence failures are
//!   only logged.

use crate::model::Channel;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2records library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The document rendered to zero pages.
    #[error("PDF '{path}' has no pages to extract")]
    EmptyDocument { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
pdf2records binary, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// A channel's provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured for the {channel} channel.\n{hint}")]
    ProviderNotConfigured {
        provider: String,
        channel: Channel,
        hint: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the exported records file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
///
/// Stored on [`crate::output::PageRecord::error`] when the page's text could
/// not be recovered. The record still exists and is flagged important.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The enhanced page could not be encoded for the OCR request.
    #[error("Page {page}: image encoding failed: {detail}")]
    EncodeFailed { page: usize, detail: String },

    /// The OCR model call failed or its output held no usable transcript.
    #[error("Page {page}: transcription failed: {detail}")]
    TranscriptionFailed { page: usize, detail: String },
}

impl PageError {
    /// Attach a page number to a stage-level transcription failure.
    pub fn from_transcription(page: usize, err: &TranscriptionError) -> Self {
        match err {
            TranscriptionError::Encode { detail } => PageError::EncodeFailed {
                page,
                detail: detail.clone(),
            },
            other => PageError::TranscriptionFailed {
                page,
                detail: other.to_string(),
            },
        }
    }
}

/// A failed call to the remote model (the transport tier).
///
/// Never retried by the pipeline.
#[derive(Debug, Clone, Error)]
pub enum ModelCallError {
    /// The endpoint was unreachable, rejected the credentials, or refused the
    /// request (including provider-side rate limiting).
    #[error("{channel} model call failed: {detail}")]
    Transport { channel: Channel, detail: String },

    /// The call did not complete within the configured API timeout.
    #[error("{channel} model call timed out after {secs}s")]
    Timeout { channel: Channel, secs: u64 },

    /// No provider is available for the channel.
    #[error("no model provider configured for the {channel} channel: {hint}")]
    NotConfigured { channel: Channel, hint: String },
}

/// Why the Transcription Stage could not produce text for a page.
///
/// Every malformed-response variant carries the raw model output so the
/// operator can see what the model actually said.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// The enhanced image could not be PNG-encoded.
    #[error("image encoding failed: {detail}")]
    Encode { detail: String },

    /// The model call itself failed.
    #[error("Failed to transcribe page: {source}")]
    Call {
        #[source]
        source: ModelCallError,
    },

    /// The response contained no `{...}` object at all.
    #[error("No JSON object found in the model's response. Raw model output: '{raw}'")]
    NoJsonObject { raw: String },

    /// A brace span was found but none of the candidates parsed as JSON.
    #[error("Failed to parse transcription JSON ({detail}). Raw model output: '{raw}'")]
    InvalidJson { detail: String, raw: String },

    /// The JSON object lacks the transcript field (or it is not a string).
    #[error("Transcription JSON has no string field '{field}'. Raw model output: '{raw}'")]
    MissingField { field: &'static str, raw: String },
}

impl TranscriptionError {
    /// The raw model output attached to this failure, if the call got that far.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            TranscriptionError::NoJsonObject { raw }
            | TranscriptionError::InvalidJson { raw, .. }
            | TranscriptionError::MissingField { raw, .. } => Some(raw),
            TranscriptionError::Encode { .. } | TranscriptionError::Call { .. } => None,
        }
    }
}

/// A failure reading or writing the persisted response cache.
///
/// Always non-fatal: the cache logs it and keeps serving from memory.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("could not read cache file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write cache file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file '{path}' is corrupt: {detail}")]
    Corrupt { path: PathBuf, detail: String },
}
