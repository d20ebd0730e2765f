//! Self-hosted model servers.
//!
//! The request format is picked from the endpoint URL:
//! - a URL containing `/v1` is treated as OpenAI-compatible (LM Studio,
//!   vLLM, llama.cpp server, LocalAI). Chat completions are tried first; a
//!   404 triggers one retry against the legacy `/completions` endpoint.
//! - any other URL is treated as Ollama-style and only `/api/generate` is
//!   called.

use serde_json::{json, Value};

use super::openai::build_chat_body;
use super::{
    normalize_base_url, ExtractionStrategy, HttpRequestSpec, ModelSettings, ProviderAdapter,
    ProviderError, ProviderKind,
};

/// Default Ollama endpoint suggested in settings.
pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:11434";

const CHAT_SUFFIX: &str = "/chat/completions";
const GENERATE_SUFFIX: &str = "/api/generate";

const OPENAI_COMPATIBLE_STRATEGIES: &[ExtractionStrategy] = &[
    ExtractionStrategy::ChatMessageContent,
    ExtractionStrategy::LegacyChoiceText,
    ExtractionStrategy::Content,
    ExtractionStrategy::Text,
];

const GENERATE_STRATEGIES: &[ExtractionStrategy] = &[
    ExtractionStrategy::Response,
    ExtractionStrategy::Text,
    ExtractionStrategy::Content,
];

/// Wire format spoken by a local server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalApi {
    /// OpenAI-compatible `/v1` server.
    OpenAiCompatible {
        /// Chat completions URL, tried first.
        chat_url: String,
        /// Legacy completions URL, tried once after a 404.
        completions_url: String,
    },
    /// Ollama-style generate endpoint.
    Generate {
        /// Generate URL.
        url: String,
    },
}

impl LocalApi {
    /// Detect the wire format from a normalized base URL.
    pub fn detect(base: &str) -> Self {
        if base.contains("/v1") {
            let root = base.strip_suffix(CHAT_SUFFIX).unwrap_or(base);
            Self::OpenAiCompatible {
                chat_url: format!("{root}{CHAT_SUFFIX}"),
                completions_url: format!("{root}/completions"),
            }
        } else {
            let root = base.strip_suffix(GENERATE_SUFFIX).unwrap_or(base);
            Self::Generate {
                url: format!("{root}{GENERATE_SUFFIX}"),
            }
        }
    }
}

/// Build a legacy completions body.
#[doc(hidden)]
pub fn build_completions_body(model: &str, prompt: &str, temperature: f32, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "temperature": temperature,
        "max_tokens": max_tokens,
        "stream": false,
    })
}

/// Build an Ollama-style generate body.
#[doc(hidden)]
pub fn build_generate_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
    })
}

/// Self-hosted model server provider.
#[derive(Debug, Clone)]
pub struct LocalProvider {
    base_url: String,
    api: LocalApi,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LocalProvider {
    /// Validate settings and build the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when the endpoint or the
    /// model name is missing, or the endpoint is not an http(s) URL.
    pub fn from_settings(
        endpoint: Option<&str>,
        settings: &ModelSettings,
    ) -> Result<Self, ProviderError> {
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration(
                    "Local LLM endpoint not configured. Set the local endpoint URL (e.g. http://localhost:11434) in settings."
                        .to_owned(),
                )
            })?;
        let model = settings.model_name().ok_or_else(|| {
            ProviderError::Configuration(
                "Local LLM model name not configured. Set the local model (e.g. llama3) in settings."
                    .to_owned(),
            )
        })?;
        let base_url = normalize_base_url(ProviderKind::Local, endpoint)?;

        Ok(Self {
            api: LocalApi::detect(&base_url),
            base_url,
            model: model.to_owned(),
            temperature: settings.temperature_or_default(),
            max_tokens: settings.max_tokens_or_default(),
        })
    }
}

impl ProviderAdapter for LocalProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, system: &str, prompt: &str) -> HttpRequestSpec {
        match &self.api {
            LocalApi::OpenAiCompatible { chat_url, .. } => HttpRequestSpec::post(
                chat_url,
                build_chat_body(&self.model, system, prompt, self.temperature, self.max_tokens),
            ),
            LocalApi::Generate { url } => {
                HttpRequestSpec::post(url, build_generate_body(&self.model, prompt))
            }
        }
    }

    fn fallback_request(&self, _system: &str, prompt: &str) -> Option<HttpRequestSpec> {
        match &self.api {
            LocalApi::OpenAiCompatible {
                completions_url, ..
            } => Some(HttpRequestSpec::post(
                completions_url,
                build_completions_body(&self.model, prompt, self.temperature, self.max_tokens),
            )),
            LocalApi::Generate { .. } => None,
        }
    }

    fn extraction_strategies(&self) -> &'static [ExtractionStrategy] {
        match self.api {
            LocalApi::OpenAiCompatible { .. } => OPENAI_COMPATIBLE_STRATEGIES,
            LocalApi::Generate { .. } => GENERATE_STRATEGIES,
        }
    }

    fn rejects_empty_content(&self) -> bool {
        true
    }

    fn network_error(&self, _url: &str, cause: &str) -> ProviderError {
        ProviderError::Network {
            provider: ProviderKind::Local,
            message: format!(
                "Cannot connect to local LLM service at {}. Make sure the server is running and the endpoint is correct. ({cause})",
                self.base_url
            ),
        }
    }
}
