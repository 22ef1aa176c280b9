//! # pdf2records
//!
//! Turn scanned Thai PDF contracts into per-page records a reviewer can
//! triage: the corrected page text, a short summary, and a flag that says
//! whether the page holds anything sensitive.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       validate the local file (%PDF magic)
//!  ├─ 2. Render      rasterise pages via pdfium (spawn_blocking)
//!  ├─ 3. Enhance     grayscale, 2× bicubic upscale, Otsu threshold
//!  ├─ 4. Transcribe  OCR model → JSON → natural_text (fails per page)
//!  ├─ 5. Analyse     instruct model → summary + is_important (never fails)
//!  └─ 6. Output      one PageRecord per page, in order, + stats
//! ```
//!
//! Every model call goes through one [`ModelGateway`]: a persisted
//! [`ResponseCache`] first, then the per-channel [`RateLimiter`], then the
//! [`ModelClient`]. Re-running a document therefore costs nothing for pages
//! already seen. Concurrent extractions share a quota and a cache only when
//! they share a gateway: build one with [`ModelGateway::from_config`] and pass
//! it to each request with [`ExtractionConfigBuilder::gateway`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2records::{extract, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider from EDGEQUAKE_LLM_PROVIDER (default: openai) and its API key.
//!     let config = ExtractionConfig::default();
//!     let output = extract("contract.pdf", &config).await?;
//!     println!("{}", pdf2records::export::to_json(&output.records)?);
//!     eprintln!(
//!         "{} of {} pages flagged for review",
//!         output.stats.important_pages, output.stats.total_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2records` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2records = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod ratelimit;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{CacheKey, CacheStats, CacheStore, FileCacheStore, MemoryCacheStore, ResponseCache};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ExtractError, ModelCallError, PageError, PersistenceError, TranscriptionError};
pub use extract::{extract, extract_from_bytes, extract_sync, extract_to_file, Pipeline};
pub use model::{
    Channel, LlmModelClient, Message, MessagePart, ModelClient, ModelGateway, ModelRequest,
    SamplingParams,
};
pub use output::{AnalysisResult, ExtractionOutput, ExtractionStats, PageRecord, TranscriptionResult};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use ratelimit::RateLimiter;
pub use stream::{extract_stream, extract_stream_from_bytes, RecordStream};
