//! Pipeline Orchestrator and the eager document-level entry points.
//!
//! [`Pipeline`] turns an ordered list of page images into one
//! [`PageRecord`] per page. Pages are processed one after another: both
//! stages share a rate-limited endpoint, so running pages in parallel would
//! only queue them at the limiter.
//!
//! A page whose transcription fails still gets a record (error message in
//! place of content, flagged important) and the run carries on. Analysis
//! cannot fail; see [`crate::pipeline::analyze`].
//!
//! Use [`crate::stream::extract_stream`] to receive records as each page
//! finishes instead of waiting for the whole document.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, PageError};
use crate::export;
use crate::model::ModelGateway;
use crate::output::{ExtractionOutput, ExtractionStats, PageRecord};
use crate::pipeline::analyze::Analyzer;
use crate::pipeline::transcribe::Transcriber;
use crate::pipeline::{input, render};
use crate::progress::ProgressCallback;
use image::DynamicImage;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// `optimized_details` of a page whose text could not be recovered.
pub const FAILED_PAGE_DETAILS: &str = "Error";

/// One processed page plus whether its analysis was a fallback.
#[derive(Debug, Clone)]
pub(crate) struct PageOutcome {
    pub record: PageRecord,
    pub analysis_fallback: bool,
}

/// Transcription + analysis over a shared [`ModelGateway`].
///
/// Cheap to clone; clones share the gateway's cache and rate limiter.
#[derive(Clone)]
pub struct Pipeline {
    transcriber: Transcriber,
    analyzer: Analyzer,
    gateway: ModelGateway,
    progress: Option<ProgressCallback>,
}

impl Pipeline {
    /// Build a pipeline over an existing gateway, taking models, sampling
    /// and the progress callback from `config`.
    pub fn new(gateway: ModelGateway, config: &ExtractionConfig) -> Self {
        Self {
            transcriber: Transcriber::new(
                gateway.clone(),
                config.ocr_model.clone(),
                config.ocr_sampling(),
            ),
            analyzer: Analyzer::new(
                gateway.clone(),
                config.instruct_model.clone(),
                config.analysis_sampling(),
            ),
            gateway,
            progress: config.progress_callback.clone(),
        }
    }

    /// Build a pipeline for `config`.
    ///
    /// Uses `config.gateway` when one was injected, so every request built
    /// from that config shares one cache and one rate limiter. Otherwise a
    /// private gateway is built with [`ModelGateway::from_config`].
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let gateway = match &config.gateway {
            Some(shared) => shared.clone(),
            None => ModelGateway::from_config(config)?,
        };
        Ok(Self::new(gateway, config))
    }

    pub fn gateway(&self) -> &ModelGateway {
        &self.gateway
    }

    /// Process `pages` in order, one record per page.
    pub async fn process(&self, pages: &[DynamicImage]) -> ExtractionOutput {
        let start = Instant::now();
        let before = self.gateway.cache().stats().await;
        let total = pages.len();

        if let Some(cb) = &self.progress {
            cb.on_extraction_start(total);
        }

        let mut outcomes = Vec::with_capacity(total);
        for (idx, page) in pages.iter().enumerate() {
            outcomes.push(self.process_page(idx + 1, total, page).await);
        }

        let after = self.gateway.cache().stats().await;
        let mut stats = summarize(&outcomes);
        stats.cache_hits = after.hits.saturating_sub(before.hits);
        stats.cache_misses = after.misses.saturating_sub(before.misses);
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        if let Some(cb) = &self.progress {
            cb.on_extraction_complete(total, stats.transcribed_pages);
        }

        ExtractionOutput {
            records: outcomes.into_iter().map(|o| o.record).collect(),
            stats,
        }
    }

    /// Transcribe and analyse a single page. Never fails.
    pub(crate) async fn process_page(
        &self,
        page_number: usize,
        total: usize,
        image: &DynamicImage,
    ) -> PageOutcome {
        if let Some(cb) = &self.progress {
            cb.on_page_start(page_number, total);
        }

        let transcript = match self.transcriber.transcribe(image).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Page {}/{}: {}", page_number, total, e);
                let error = PageError::from_transcription(page_number, &e);
                if let Some(cb) = &self.progress {
                    cb.on_page_error(page_number, total, &error.to_string());
                }
                return PageOutcome {
                    record: PageRecord {
                        page_number,
                        analyze_contents: format!("Error processing this page: {e}"),
                        optimized_details: FAILED_PAGE_DETAILS.to_string(),
                        is_important: true,
                        error: Some(error),
                    },
                    analysis_fallback: false,
                };
            }
        };

        let analysis = self.analyzer.analyze(&transcript.natural_text).await;

        // An empty echo counts as absent.
        let analyze_contents = if analysis.transcribed_contents.trim().is_empty() {
            transcript.natural_text
        } else {
            analysis.transcribed_contents
        };

        debug!(
            "Page {}/{}: important={} fallback={}",
            page_number, total, analysis.is_important, analysis.fallback
        );
        if let Some(cb) = &self.progress {
            cb.on_page_complete(page_number, total, analysis.is_important);
        }

        PageOutcome {
            record: PageRecord {
                page_number,
                analyze_contents,
                optimized_details: analysis.optimized_details,
                is_important: analysis.is_important,
                error: None,
            },
            analysis_fallback: analysis.fallback,
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("transcriber", &self.transcriber)
            .field("analyzer", &self.analyzer)
            .field(
                "progress",
                &self
                    .progress
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

/// Extract page records from a PDF file.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(ExtractError)` only when the document as a whole cannot be
/// processed: missing or unreadable file, not a PDF, wrong password, pdfium
/// unavailable, no pages, or no usable model provider. Page failures are
/// reported on the records and in [`ExtractionStats::failed_pages`].
///
/// # Example
/// ```rust,no_run
/// use pdf2records::{extract, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let output = extract("contract.pdf", &config).await?;
/// for record in output.records.iter().filter(|r| r.is_important) {
///     println!("p.{}: {}", record.page_number, record.optimized_details);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract(
    input_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let input_path = input_path.as_ref();
    info!("Starting extraction: {}", input_path.display());

    // ── Step 1: Validate input ───────────────────────────────────────────
    let pdf_path = input::resolve_local(input_path)?;

    // ── Step 2: Build the pipeline ───────────────────────────────────────
    let pipeline = Pipeline::from_config(config)?;

    // ── Step 3: Rasterise pages ──────────────────────────────────────────
    let render_start = Instant::now();
    let pages = render::render_pages(
        &pdf_path,
        config.max_rendered_pixels,
        config.password.as_deref(),
    )
    .await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", pages.len(), render_duration_ms);

    // ── Step 4: Transcribe + analyse ─────────────────────────────────────
    let mut output = pipeline.process(&pages).await;

    output.stats.render_duration_ms = render_duration_ms;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Extraction complete: {}/{} pages transcribed, {} flagged important, {}ms total",
        output.stats.transcribed_pages,
        output.stats.total_pages,
        output.stats.important_pages,
        output.stats.total_duration_ms
    );

    Ok(output)
}

/// Extract from PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed on
/// return, since pdfium only opens files by path.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    input::check_magic(bytes, Path::new("<bytes>"))?;
    let tmp = write_temp_pdf(bytes)?;
    extract(tmp.path(), config).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_path, config))
}

/// Extract and write the JSON export to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract(input_path, config).await?;
    let path = output_path.as_ref();
    let json = export::to_json(&output.records)
        .map_err(|e| ExtractError::Internal(format!("JSON export failed: {e}")))?;
    write_atomic(path, json.as_bytes()).await?;
    Ok(output.stats)
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExtractError> {
    let write_err = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

pub(crate) fn write_temp_pdf(bytes: &[u8]) -> Result<tempfile::NamedTempFile, ExtractError> {
    let mut tmp = tempfile::Builder::new()
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    Ok(tmp)
}

pub(crate) fn summarize(outcomes: &[PageOutcome]) -> ExtractionStats {
    let failed = outcomes.iter().filter(|o| o.record.is_failed()).count();
    ExtractionStats {
        total_pages: outcomes.len(),
        transcribed_pages: outcomes.len() - failed,
        failed_pages: failed,
        important_pages: outcomes.iter().filter(|o| o.record.is_important).count(),
        analysis_fallbacks: outcomes.iter().filter(|o| o.analysis_fallback).count(),
        ..Default::default()
    }
}
