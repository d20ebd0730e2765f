//! Anthropic provider using the `/v1/messages` API.

use serde_json::{json, Value};

use super::{
    ExtractionStrategy, HttpRequestSpec, ModelSettings, ProviderAdapter, ProviderError,
    ProviderKind,
};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const STRATEGIES: &[ExtractionStrategy] = &[ExtractionStrategy::ContentBlockText];

/// Build an Anthropic messages body with a single user message.
///
/// The messages API takes no system message in this shape; the prompt
/// already carries every instruction.
#[doc(hidden)]
pub fn build_messages_body(model: &str, prompt: &str, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [
            {"role": "user", "content": prompt},
        ],
    })
}

/// Anthropic messages API provider.
#[derive(Clone)]
pub struct AnthropicProvider {
    model: String,
    api_key: String,
    max_tokens: u32,
    endpoint: String,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl AnthropicProvider {
    /// Validate settings and build the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when the API key is missing.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .key()
            .ok_or_else(|| ProviderError::missing_key(ProviderKind::Anthropic))?;
        let model = settings
            .model_name()
            .or_else(|| ProviderKind::Anthropic.default_model())
            .unwrap_or_default();

        Ok(Self {
            model: model.to_owned(),
            api_key: api_key.to_owned(),
            max_tokens: settings.max_tokens_or_default(),
            endpoint: ANTHROPIC_API_URL.to_owned(),
        })
    }

    /// Override the fixed endpoint (for integration testing).
    #[doc(hidden)]
    #[must_use]
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }
}

impl ProviderAdapter for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, _system: &str, prompt: &str) -> HttpRequestSpec {
        HttpRequestSpec::post(
            &self.endpoint,
            build_messages_body(&self.model, prompt, self.max_tokens),
        )
        .header("x-api-key", &self.api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
    }

    fn extraction_strategies(&self) -> &'static [ExtractionStrategy] {
        STRATEGIES
    }
}
