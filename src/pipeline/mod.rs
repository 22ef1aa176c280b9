//! Pipeline stages for PDF-to-records extraction.
//!
//! Each submodule implements one transformation step and is tested on its
//! own. Only [`transcribe`] and [`analyze`] talk to a model, and both do so
//! through the shared [`crate::model::ModelGateway`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ enhance ──▶ encode ──▶ OCR model ──▶ json ──▶ postprocess
//! (path)   (pdfium)   (2×, Otsu)  (PNG b64)                (recover) (cleanup)
//!                                                                        │
//!                               analyze ◀─────────────── transcript ◀────┘
//!                    (instruct model, json, validate, fail-safe fallback)
//! ```
//!
//! 1. [`input`]: validate the user-supplied path (exists, readable, `%PDF`)
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking`
//! 3. [`enhance`]: grayscale, 2× bicubic upscale, Otsu binarisation
//! 4. [`encode`]: PNG-encode and base64-wrap the enhanced page
//! 5. [`transcribe`]: OCR request, JSON recovery, `natural_text`
//! 6. [`json`]: balanced-brace scan for the first JSON object in model output
//! 7. [`postprocess`]: deterministic transcript cleanup
//! 8. [`analyze`]: summary and importance flag, never fails

pub mod analyze;
pub mod encode;
pub mod enhance;
pub mod input;
pub mod json;
pub mod postprocess;
pub mod render;
pub mod transcribe;
