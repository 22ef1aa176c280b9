//! Streaming extraction API: emit page records as they complete.
//!
//! Unlike the eager [`crate::extract::extract`], which returns only after all
//! pages finish, [`extract_stream`] yields each [`PageRecord`] as soon as its
//! page has been transcribed and analysed. Pages are still processed one at
//! a time, so records always arrive in page order.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::{write_temp_pdf, Pipeline};
use crate::output::PageRecord;
use crate::pipeline::{input, render};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of page records.
pub type RecordStream = Pin<Box<dyn Stream<Item = PageRecord> + Send>>;

impl Pipeline {
    /// Stream one record per page, in page order.
    ///
    /// The extraction start/complete progress events are not fired here;
    /// per-page events are.
    pub fn process_stream(&self, pages: Vec<DynamicImage>) -> RecordStream {
        let pipeline = self.clone();
        let total = pages.len();
        let pages = Arc::new(pages);

        let s = stream::iter(0..total).then(move |idx| {
            let pipeline = pipeline.clone();
            let pages = Arc::clone(&pages);
            async move {
                pipeline
                    .process_page(idx + 1, total, &pages[idx])
                    .await
                    .record
            }
        });

        Box::pin(s)
    }
}

/// Extract from a PDF file, streaming records as pages complete.
///
/// Input validation, provider setup and rasterisation happen before the
/// stream is returned, so fatal problems surface as `Err` here and never
/// inside the stream.
pub async fn extract_stream(
    input_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<RecordStream, ExtractError> {
    let input_path = input_path.as_ref();
    info!("Starting streaming extraction: {}", input_path.display());

    let pdf_path = input::resolve_local(input_path)?;
    let pipeline = Pipeline::from_config(config)?;
    let pages = render::render_pages(
        &pdf_path,
        config.max_rendered_pixels,
        config.password.as_deref(),
    )
    .await?;

    Ok(pipeline.process_stream(pages))
}

/// Streaming equivalent of [`crate::extract::extract_from_bytes`].
///
/// Pages are rasterised before this returns, so the temporary file is gone
/// by the time the stream is polled.
pub async fn extract_stream_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<RecordStream, ExtractError> {
    input::check_magic(bytes, Path::new("<bytes>"))?;
    let tmp = write_temp_pdf(bytes)?;
    extract_stream(tmp.path(), config).await
}
