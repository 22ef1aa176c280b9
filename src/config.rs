//! Configuration for an extraction run.
//!
//! Every knob lives on [`ExtractionConfig`], built with
//! [`ExtractionConfigBuilder`]. Setters clamp obviously out-of-range values;
//! [`ExtractionConfigBuilder::build`] rejects combinations that cannot work.

use crate::error::ExtractError;
use crate::model::{ModelClient, ModelGateway, SamplingParams};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default vision model for the OCR channel.
pub const DEFAULT_OCR_MODEL: &str = "typhoon-ocr-preview";
/// Default text model for the instruct channel.
pub const DEFAULT_INSTRUCT_MODEL: &str = "typhoon-v2.1-12b-instruct";
/// Default location of the persisted response cache.
pub const DEFAULT_CACHE_PATH: &str = ".pdf2records/response-cache.json";

/// Configuration for a PDF extraction.
///
/// # Example
/// ```rust
/// use pdf2records::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .ocr_requests_per_minute(10)
///     .no_cache()
///     .build()
///     .unwrap();
/// assert!(config.cache_path.is_none());
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// `edgequake-llm` provider name ("openai", "ollama", …). If None, falls
    /// back to `EDGEQUAKE_LLM_PROVIDER`, then `openai`.
    pub provider_name: Option<String>,

    /// Vision model used for transcription. Default: `typhoon-ocr-preview`.
    pub ocr_model: String,

    /// Text model used for analysis. Default: `typhoon-v2.1-12b-instruct`.
    pub instruct_model: String,

    /// OCR channel quota. 0 disables limiting. Default: 20.
    pub ocr_requests_per_minute: u32,

    /// Instruct channel quota. 0 disables limiting. Default: 200.
    pub instruct_requests_per_minute: u32,

    /// Default: 0.0.
    pub ocr_temperature: f32,

    /// Default: 4096.
    pub ocr_max_tokens: usize,

    /// Default: 0.1.
    pub analysis_temperature: f32,

    /// Default: 2048.
    pub analysis_max_tokens: usize,

    /// Where the response cache is persisted. `None` keeps it in memory for
    /// the lifetime of the run. Default: `.pdf2records/response-cache.json`.
    pub cache_path: Option<PathBuf>,

    /// Cap on the longest edge of a rendered page, in pixels. Default: 2000.
    ///
    /// The enhancer doubles both dimensions again, so the image sent to the
    /// OCR model is at most twice this value on its longest side.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Pre-built model client. Takes precedence over `provider_name`.
    pub client: Option<Arc<dyn ModelClient>>,

    /// Shared cache + rate limiter. When set, `client`, `provider_name`,
    /// `cache_path` and the quotas are ignored: the gateway already fixes
    /// them, and every request given this config draws from its quota.
    pub gateway: Option<ModelGateway>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider_name: None,
            ocr_model: DEFAULT_OCR_MODEL.to_string(),
            instruct_model: DEFAULT_INSTRUCT_MODEL.to_string(),
            ocr_requests_per_minute: 20,
            instruct_requests_per_minute: 200,
            ocr_temperature: 0.0,
            ocr_max_tokens: 4096,
            analysis_temperature: 0.1,
            analysis_max_tokens: 2048,
            cache_path: Some(PathBuf::from(DEFAULT_CACHE_PATH)),
            max_rendered_pixels: 2000,
            password: None,
            api_timeout_secs: 120,
            client: None,
            gateway: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("provider_name", &self.provider_name)
            .field("ocr_model", &self.ocr_model)
            .field("instruct_model", &self.instruct_model)
            .field("ocr_requests_per_minute", &self.ocr_requests_per_minute)
            .field(
                "instruct_requests_per_minute",
                &self.instruct_requests_per_minute,
            )
            .field("ocr_sampling", &self.ocr_sampling())
            .field("analysis_sampling", &self.analysis_sampling())
            .field("cache_path", &self.cache_path)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("client", &self.client.as_ref().map(|_| "<dyn ModelClient>"))
            .field("gateway", &self.gateway)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn ocr_sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.ocr_temperature,
            max_tokens: self.ocr_max_tokens,
        }
    }

    pub fn analysis_sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.analysis_temperature,
            max_tokens: self.analysis_max_tokens,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExtractionConfigBuilder")
            .field(&self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn instruct_model(mut self, model: impl Into<String>) -> Self {
        self.config.instruct_model = model.into();
        self
    }

    pub fn ocr_requests_per_minute(mut self, rpm: u32) -> Self {
        self.config.ocr_requests_per_minute = rpm;
        self
    }

    pub fn instruct_requests_per_minute(mut self, rpm: u32) -> Self {
        self.config.instruct_requests_per_minute = rpm;
        self
    }

    pub fn ocr_temperature(mut self, t: f32) -> Self {
        self.config.ocr_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn ocr_max_tokens(mut self, n: usize) -> Self {
        self.config.ocr_max_tokens = n;
        self
    }

    pub fn analysis_temperature(mut self, t: f32) -> Self {
        self.config.analysis_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn analysis_max_tokens(mut self, n: usize) -> Self {
        self.config.analysis_max_tokens = n;
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = Some(path.into());
        self
    }

    /// Keep cached responses in memory only.
    pub fn no_cache(mut self) -> Self {
        self.config.cache_path = None;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    /// Share `gateway` with every request built from this config.
    pub fn gateway(mut self, gateway: ModelGateway) -> Self {
        self.config.gateway = Some(gateway);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.ocr_model.trim().is_empty() || c.instruct_model.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "model names must not be empty".into(),
            ));
        }
        if c.ocr_max_tokens == 0 || c.analysis_max_tokens == 0 {
            return Err(ExtractError::InvalidConfig(
                "max tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ExtractError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
