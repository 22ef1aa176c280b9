//! The gated path every model call takes: cache, then rate limiter, then client.
//!
//! The cache is consulted before the limiter so a cache hit costs neither a
//! network round trip nor a slot in the channel's quota.
//!
//! One gateway is one quota and one cache. Concurrent extractions that must
//! respect the same provider limits have to share a gateway: build it once
//! with [`ModelGateway::from_config`] and inject it with
//! [`crate::config::ExtractionConfigBuilder::gateway`].

use super::provider::{resolve_provider_name, LlmModelClient};
use super::{Channel, ModelClient, ModelRequest};
use crate::cache::{CacheStore, FileCacheStore, MemoryCacheStore, ResponseCache};
use crate::config::ExtractionConfig;
use crate::error::{ExtractError, ModelCallError};
use crate::ratelimit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shared by both pipeline stages and by every request holding a clone.
#[derive(Clone)]
pub struct ModelGateway {
    client: Arc<dyn ModelClient>,
    cache: Arc<ResponseCache>,
    limiter: Arc<RateLimiter>,
}

impl ModelGateway {
    pub fn new(
        client: Arc<dyn ModelClient>,
        cache: Arc<ResponseCache>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            client,
            cache,
            limiter,
        }
    }

    /// Build the client, cache and rate limiter described by `config`.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let client = resolve_client(config)?;

        let store: Box<dyn CacheStore> = match &config.cache_path {
            Some(path) => Box::new(FileCacheStore::new(path.clone())),
            None => Box::new(MemoryCacheStore),
        };

        let limiter = RateLimiter::unbounded()
            .with_channel(Channel::Ocr, config.ocr_requests_per_minute)
            .with_channel(Channel::Instruct, config.instruct_requests_per_minute);

        Ok(Self::new(
            client,
            Arc::new(ResponseCache::new(store)),
            Arc::new(limiter),
        ))
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Return the raw response for `request`, from cache when possible.
    pub async fn request(&self, request: &ModelRequest) -> Result<String, ModelCallError> {
        self.cache
            .get_or_create(request, move || async move {
                self.limiter.wait(request.channel).await;
                debug!("Calling {} model '{}'", request.channel, request.model);
                self.client.call(request).await
            })
            .await
    }
}

/// Injected client first, then a named (or environment-selected) provider.
fn resolve_client(config: &ExtractionConfig) -> Result<Arc<dyn ModelClient>, ExtractError> {
    if let Some(client) = &config.client {
        return Ok(Arc::clone(client));
    }

    let provider = resolve_provider_name(config.provider_name.as_deref());
    debug!(
        "Using provider '{}' (ocr={}, instruct={})",
        provider, config.ocr_model, config.instruct_model
    );
    let client = LlmModelClient::from_provider_name(
        &provider,
        &config.ocr_model,
        &config.instruct_model,
        Duration::from_secs(config.api_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("client", &"<dyn ModelClient>")
            .field("cache", &self.cache)
            .field("limiter", &self.limiter)
            .finish()
    }
}
