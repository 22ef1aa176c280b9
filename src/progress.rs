//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to follow a
//! run page by page. The CLI drives its progress bar from these events; a
//! service could forward them to a channel or a job table instead.
//!
//! # Example
//!
//! ```rust
//! use pdf2records::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FlagCounter {
//!     flagged: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for FlagCounter {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, is_important: bool) {
//!         if is_important {
//!             self.flagged.fetch_add(1, Ordering::SeqCst);
//!             eprintln!("Page {}/{} needs review", page_num, total_pages);
//!         }
//!     }
//! }
//!
//! let cb = Arc::new(FlagCounter { flagged: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(cb as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// Pages are processed one after another, so events for one run never
/// overlap. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after rendering, with the number of pages to process.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before the page's OCR request is issued.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page was transcribed and analysed.
    ///
    /// `is_important` is the final flag on the record, so analysis fallbacks
    /// report `true`.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, is_important: bool) {
        let _ = (page_num, total_pages, is_important);
    }

    /// Called when a page could not be transcribed. Its record is still
    /// produced.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has a record.
    ///
    /// * `transcribed_count`: pages whose text was recovered
    fn on_extraction_complete(&self, total_pages: usize, transcribed_count: usize) {
        let _ = (total_pages, transcribed_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
