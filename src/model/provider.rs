//! [`ModelClient`] backed by `edgequake-llm` providers.
//!
//! Each channel gets its own provider instance because `ProviderFactory`
//! binds the model at construction time: the OCR channel talks to a vision
//! model, the instruct channel to a text model, possibly on the same
//! endpoint.

use super::{Channel, Message, MessagePart, ModelClient, ModelRequest, Role};
use crate::error::{ExtractError, ModelCallError};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default provider when neither the config nor the environment names one.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Two providers, one per channel, plus the per-call timeout.
pub struct LlmModelClient {
    ocr: Arc<dyn LLMProvider>,
    instruct: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl LlmModelClient {
    pub fn new(
        ocr: Arc<dyn LLMProvider>,
        instruct: Arc<dyn LLMProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            ocr,
            instruct,
            timeout,
        }
    }

    /// Create both providers through [`ProviderFactory`].
    ///
    /// The factory reads the provider's API key from the environment
    /// (`OPENAI_API_KEY`, …).
    pub fn from_provider_name(
        provider_name: &str,
        ocr_model: &str,
        instruct_model: &str,
        timeout: Duration,
    ) -> Result<Self, ExtractError> {
        let ocr = create_provider(provider_name, ocr_model, Channel::Ocr)?;
        let instruct = create_provider(provider_name, instruct_model, Channel::Instruct)?;
        Ok(Self::new(ocr, instruct, timeout))
    }

    fn provider(&self, channel: Channel) -> &Arc<dyn LLMProvider> {
        match channel {
            Channel::Ocr => &self.ocr,
            Channel::Instruct => &self.instruct,
        }
    }
}

#[async_trait]
impl ModelClient for LlmModelClient {
    async fn call(&self, request: &ModelRequest) -> Result<String, ModelCallError> {
        let messages = to_chat_messages(&request.messages);
        let options = CompletionOptions {
            temperature: Some(request.sampling.temperature),
            max_tokens: Some(request.sampling.max_tokens),
            ..Default::default()
        };

        let provider = self.provider(request.channel);
        let call = provider.chat(&messages, Some(&options));

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => {
                debug!(
                    "{} call: {} input tokens, {} output tokens",
                    request.channel, response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Ok(Err(e)) => Err(ModelCallError::Transport {
                channel: request.channel,
                detail: e.to_string(),
            }),
            Err(_) => Err(ModelCallError::Timeout {
                channel: request.channel,
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// Resolve the provider name: explicit setting, then `EDGEQUAKE_LLM_PROVIDER`,
/// then [`DEFAULT_PROVIDER`].
pub fn resolve_provider_name(configured: Option<&str>) -> String {
    if let Some(name) = configured.filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match std::env::var("EDGEQUAKE_LLM_PROVIDER") {
        Ok(name) if !name.is_empty() => name,
        _ => DEFAULT_PROVIDER.to_string(),
    }
}

fn create_provider(
    provider_name: &str,
    model: &str,
    channel: Channel,
) -> Result<Arc<dyn LLMProvider>, ExtractError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ExtractError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            channel,
            hint: format!("model '{model}': {e}"),
        }
    })
}

/// Map our message model onto `edgequake-llm` chat messages.
///
/// User messages carrying images become a single multimodal message whose
/// text is the concatenation of the text parts.
fn to_chat_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| {
            let text = m.text();
            match m.role {
                Role::System => ChatMessage::system(text),
                Role::User => {
                    let images: Vec<ImageData> = m
                        .parts
                        .iter()
                        .filter_map(|p| match p {
                            MessagePart::Image { mime_type, data } => Some(
                                ImageData::new(data.clone(), mime_type.clone()).with_detail("high"),
                            ),
                            MessagePart::Text { .. } => None,
                        })
                        .collect();
                    if images.is_empty() {
                        ChatMessage::user(text)
                    } else {
                        ChatMessage::user_with_images(text, images)
                    }
                }
            }
        })
        .collect()
}
