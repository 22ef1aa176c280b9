//! Model requests and the model-call seam.
//!
//! A [`ModelRequest`] is the immutable description of one chat completion:
//! which [`Channel`] it belongs to, which model serves it, the ordered
//! messages, and the sampling parameters. The same value is used for rate
//! limiting (by channel) and as the cache-key input (all of it).
//!
//! [`ModelClient`] is the only place the pipeline touches the network. The
//! production implementation is [`provider::LlmModelClient`]; tests plug in
//! scripted clients.

pub mod gateway;
pub mod provider;

use crate::error::ModelCallError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use gateway::ModelGateway;
pub use provider::LlmModelClient;

/// A rate-limiting lane, one per API usage pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Vision calls that transcribe page images.
    Ocr,
    /// Text-only instruction calls that classify and summarise.
    Instruct,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Ocr => f.write_str("ocr"),
            Channel::Instruct => f.write_str("instruct"),
        }
    }
}

/// Speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    /// An inlined image; `data` is base64 without the `data:` prefix.
    Image { mime_type: String, data: String },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }
}

/// A chat message made of ordered parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            parts: vec![MessagePart::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![MessagePart::text(text)],
        }
    }

    pub fn user_with_parts(parts: Vec<MessagePart>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// Concatenated text parts, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: usize,
}

/// One memoisable model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    pub channel: Channel,
    pub model: String,
    pub messages: Vec<Message>,
    pub sampling: SamplingParams,
}

/// The remote model, seen from the pipeline.
///
/// Returns the raw assistant text. Implementations must not retry on
/// their own; a failure surfaces to the calling stage as-is.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn call(&self, request: &ModelRequest) -> Result<String, ModelCallError>;
}
