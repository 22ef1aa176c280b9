//! Transcription Stage: one page image → corrected page text.
//!
//! Enhance, encode, ask the OCR model through the [`ModelGateway`], recover
//! the JSON object, read `natural_text`. There is no fallback
//! here: a page whose text cannot be recovered surfaces as a
//! [`TranscriptionError`], never as a made-up transcript.

use crate::error::TranscriptionError;
use crate::model::{Channel, Message, MessagePart, ModelGateway, ModelRequest, SamplingParams};
use crate::output::TranscriptionResult;
use crate::pipeline::json::{extract_json_object, JsonRecoveryError};
use crate::pipeline::{encode, enhance, postprocess};
use crate::prompts::{FIELD_NATURAL_TEXT, TRANSCRIPTION_PROMPT};
use image::DynamicImage;
use tracing::{debug, warn};

/// The OCR half of the pipeline.
#[derive(Debug, Clone)]
pub struct Transcriber {
    gateway: ModelGateway,
    model: String,
    sampling: SamplingParams,
}

impl Transcriber {
    pub fn new(gateway: ModelGateway, model: impl Into<String>, sampling: SamplingParams) -> Self {
        Self {
            gateway,
            model: model.into(),
            sampling,
        }
    }

    /// Build the OCR request for an already-encoded page image.
    pub fn build_request(&self, image: MessagePart) -> ModelRequest {
        ModelRequest {
            channel: Channel::Ocr,
            model: self.model.clone(),
            messages: vec![Message::user_with_parts(vec![
                MessagePart::text(TRANSCRIPTION_PROMPT),
                image,
            ])],
            sampling: self.sampling,
        }
    }

    /// Transcribe one page.
    pub async fn transcribe(
        &self,
        image: &DynamicImage,
    ) -> Result<TranscriptionResult, TranscriptionError> {
        let enhanced = enhance::enhance(image);
        let part = encode::encode_page(&enhanced).map_err(|e| TranscriptionError::Encode {
            detail: e.to_string(),
        })?;

        let request = self.build_request(part);
        let raw = self
            .gateway
            .request(&request)
            .await
            .map_err(|source| TranscriptionError::Call { source })?;

        let result = parse_transcription(&raw);
        match &result {
            Ok(r) => debug!("Transcription successful ({} chars)", r.natural_text.len()),
            Err(e) => warn!("Transcription failed: {}", e),
        }
        result
    }
}

/// Recover the transcript from a raw OCR response.
pub fn parse_transcription(raw: &str) -> Result<TranscriptionResult, TranscriptionError> {
    let object = extract_json_object(raw).map_err(|e| match e {
        JsonRecoveryError::NoObject => TranscriptionError::NoJsonObject {
            raw: raw.to_string(),
        },
        JsonRecoveryError::Invalid(detail) => TranscriptionError::InvalidJson {
            detail,
            raw: raw.to_string(),
        },
    })?;

    let text = object
        .get(FIELD_NATURAL_TEXT)
        .and_then(|v| v.as_str())
        .ok_or_else(|| TranscriptionError::MissingField {
            field: FIELD_NATURAL_TEXT,
            raw: raw.to_string(),
        })?;

    Ok(TranscriptionResult {
        natural_text: postprocess::clean_transcript(text),
    })
}
