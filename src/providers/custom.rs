//! User-defined OpenAI-compatible endpoint.

use std::collections::BTreeMap;

use super::openai::{build_chat_body, CHAT_STRATEGIES};
use super::{
    normalize_base_url, ExtractionStrategy, HttpRequestSpec, ModelSettings, ProviderAdapter,
    ProviderError, ProviderKind,
};

/// Custom chat completions provider.
#[derive(Clone)]
pub struct CustomProvider {
    url: String,
    model: String,
    api_key: String,
    headers: BTreeMap<String, String>,
    temperature: f32,
    max_tokens: u32,
}

impl std::fmt::Debug for CustomProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomProvider")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CustomProvider {
    /// Validate settings and build the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when the base URL, API key
    /// or model is missing, or the base URL is not an http(s) URL.
    pub fn from_settings(
        base_url: Option<&str>,
        headers: &BTreeMap<String, String>,
        settings: &ModelSettings,
    ) -> Result<Self, ProviderError> {
        let base_url = base_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ProviderError::Configuration(
                    "Custom provider base URL not configured. Set it in settings.".to_owned(),
                )
            })?;
        let api_key = settings
            .key()
            .ok_or_else(|| ProviderError::missing_key(ProviderKind::Custom))?;
        let model = settings.model_name().ok_or_else(|| {
            ProviderError::Configuration(
                "Custom provider model not configured. Set it in settings.".to_owned(),
            )
        })?;
        let base = normalize_base_url(ProviderKind::Custom, base_url)?;

        Ok(Self {
            url: format!("{base}/chat/completions"),
            model: model.to_owned(),
            api_key: api_key.to_owned(),
            headers: headers.clone(),
            temperature: settings.temperature_or_default(),
            max_tokens: settings.max_tokens_or_default(),
        })
    }

    /// Chat completions URL requests are sent to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ProviderAdapter for CustomProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Custom
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
        let mut request = HttpRequestSpec::post(&self.url, body)
            .header("authorization", format!("Bearer {}", self.api_key));
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        request
    }

    fn extraction_strategies(&self) -> &'static [ExtractionStrategy] {
        CHAT_STRATEGIES
    }
}
