//! Image encoding: enhanced `GrayImage` → base64 PNG message part.
//!
//! PNG keeps the binarised glyph edges exact; JPEG ringing around
//! black-on-white text is precisely what confuses an OCR model. The
//! base64 payload is inlined into the request as a [`MessagePart::Image`].

use crate::model::MessagePart;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::GrayImage;
use std::io::Cursor;
use tracing::debug;

pub const PNG_MIME: &str = "image/png";

/// Encode an enhanced page as an inlined PNG image part.
pub fn encode_page(img: &GrayImage) -> Result<MessagePart, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(MessagePart::Image {
        mime_type: PNG_MIME.to_string(),
        data: b64,
    })
}
