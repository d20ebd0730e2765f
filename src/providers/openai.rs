//! OpenAI-style chat completions: OpenAI itself plus DeepSeek and Groq.
//!
//! The body builder here is shared with every OpenAI-compatible provider
//! (local `/v1` servers, OpenRouter, custom endpoints).

use serde_json::{json, Value};

use super::{
    ExtractionStrategy, HttpRequestSpec, ModelSettings, ProviderAdapter, ProviderError,
    ProviderKind,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Extraction order for OpenAI-shaped chat responses.
pub const CHAT_STRATEGIES: &[ExtractionStrategy] = &[ExtractionStrategy::ChatMessageContent];

/// Build an OpenAI chat completions body with a system and a user message.
#[doc(hidden)]
pub fn build_chat_body(
    model: &str,
    system: &str,
    prompt: &str,
    temperature: f32,
    max_tokens: u32,
) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": prompt},
        ],
        "temperature": temperature,
        "max_tokens": max_tokens,
    })
}

/// Hosted OpenAI-compatible chat provider.
#[derive(Clone)]
pub struct OpenAiProvider {
    kind: ProviderKind,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    endpoint: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenAiProvider {
    /// Validate settings for one of the OpenAI-style hosted kinds.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when the API key is missing
    /// or `kind` is not an OpenAI-style hosted provider.
    pub fn from_settings(kind: ProviderKind, settings: &ModelSettings) -> Result<Self, ProviderError> {
        let endpoint = match kind {
            ProviderKind::OpenAi => OPENAI_API_URL,
            ProviderKind::DeepSeek => DEEPSEEK_API_URL,
            ProviderKind::Groq => GROQ_API_URL,
            other => {
                return Err(ProviderError::Configuration(format!(
                    "{other} is not an OpenAI-style hosted provider"
                )))
            }
        };
        let api_key = settings.key().ok_or_else(|| ProviderError::missing_key(kind))?;
        let model = settings
            .model_name()
            .or_else(|| kind.default_model())
            .unwrap_or_default();

        Ok(Self {
            kind,
            model: model.to_owned(),
            api_key: api_key.to_owned(),
            temperature: settings.temperature_or_default(),
            max_tokens: settings.max_tokens_or_default(),
            endpoint: endpoint.to_owned(),
        })
    }

    /// Override the fixed endpoint (for integration testing).
    #[doc(hidden)]
    #[must_use]
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = url.into();
        self
    }

    /// Endpoint URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ProviderAdapter for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, system: &str, prompt: &str) -> HttpRequestSpec {
        let body = build_chat_body(
            &self.model,
            system,
            prompt,
            self.temperature,
            self.max_tokens,
        );
        HttpRequestSpec::post(&self.endpoint, body)
            .header("authorization", format!("Bearer {}", self.api_key))
    }

    fn extraction_strategies(&self) -> &'static [ExtractionStrategy] {
        CHAT_STRATEGIES
    }
}
