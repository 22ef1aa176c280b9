//! Deterministic page preprocessing ahead of OCR.
//!
//! Three steps, always in this order:
//!
//! 1. **Grayscale**: collapse colour channels to luma.
//! 2. **2× upscale**: Catmull-Rom (bicubic) resampling, so thin Thai
//!    diacritics and tone marks span more pixels.
//! 3. **Otsu binarisation**: the threshold that best separates the two
//!    intensity classes is computed per page. Scan brightness differs from
//!    one document to the next, and a fixed cut-off would erase faint prints
//!    or blacken grey backgrounds.
//!
//! The output is a single-channel raster with every pixel either 0 or 255,
//! exactly twice the input width and height.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use tracing::debug;

/// Linear upscale factor applied before thresholding.
pub const UPSCALE_FACTOR: u32 = 2;

/// Enhance a page raster for OCR.
pub fn enhance(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let (w, h) = gray.dimensions();

    let upscaled = imageops::resize(
        &gray,
        w * UPSCALE_FACTOR,
        h * UPSCALE_FACTOR,
        FilterType::CatmullRom,
    );

    let level = otsu_level(&upscaled);
    debug!(
        "Enhanced {}x{} → {}x{} px, Otsu threshold {}",
        w,
        h,
        upscaled.width(),
        upscaled.height(),
        level
    );

    threshold(&upscaled, level, ThresholdType::Binary)
}
