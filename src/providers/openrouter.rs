//! OpenRouter provider (multi-model gateway) and its model catalog.
//!
//! OpenRouter speaks the OpenAI chat completions format. The differences:
//!
//! - Base URL: `https://openrouter.ai/api/v1`
//! - Extra identifying headers: `HTTP-Referer` and `X-Title`
//! - Model IDs use `org/name` format and there is no default model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::openai::{build_chat_body, CHAT_STRATEGIES};
use super::{
    status_error, ExtractionStrategy, HttpRequestSpec, ModelSettings, ProviderAdapter,
    ProviderError, ProviderKind,
};

const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
/// Public model catalog endpoint.
pub const OPENROUTER_MODELS_URL: &str = "https://openrouter.ai/api/v1/models";
/// Value of the `HTTP-Referer` identifying header.
pub const HTTP_REFERER: &str = "https://github.com/testsmith/testsmith";
/// Value of the `X-Title` identifying header.
pub const X_TITLE: &str = "Testsmith";

// ---------------------------------------------------------------------------
// Chat provider
// ---------------------------------------------------------------------------

/// OpenRouter chat provider.
#[derive(Clone)]
pub struct OpenRouterProvider {
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    endpoint: String,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl OpenRouterProvider {
    /// Validate settings and build the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when the API key or the
    /// model is missing.
    pub fn from_settings(settings: &ModelSettings) -> Result<Self, ProviderError> {
        let api_key = settings
            .key()
            .ok_or_else(|| ProviderError::missing_key(ProviderKind::OpenRouter))?;
        let model = settings.model_name().ok_or_else(|| {
            ProviderError::Configuration(
                "OpenRouter model not selected. Choose a model (e.g. openai/gpt-4o-mini) in settings."
                    .to_owned(),
            )
        })?;

        Ok(Self {
            model: model.to_owned(),
            api_key: api_key.to_owned(),
            temperature: settings.temperature_or_default(),
            max_tokens: settings.max_tokens_or_default(),
            endpoint: OPENROUTER_CHAT_URL.to_owned(),
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

impl ProviderAdapter for OpenRouterProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
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
            .header("HTTP-Referer", HTTP_REFERER)
            .header("X-Title", X_TITLE)
    }

    fn extraction_strategies(&self) -> &'static [ExtractionStrategy] {
        CHAT_STRATEGIES
    }
}

// ---------------------------------------------------------------------------
// Model catalog
// ---------------------------------------------------------------------------

/// One entry of the OpenRouter model catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier, e.g. `openai/gpt-4o-mini`.
    pub id: String,
    /// Display name; falls back to the id.
    pub display_name: String,
    /// Context window in tokens; 0 when unknown.
    pub context_length: u64,
    /// Per-token prices keyed by kind (`prompt`, `completion`, ...).
    pub pricing: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<BTreeMap<String, Value>>,
}

impl From<CatalogEntry> for ModelInfo {
    fn from(entry: CatalogEntry) -> Self {
        let display_name = entry
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| entry.id.clone());
        let pricing = entry
            .pricing
            .unwrap_or_default()
            .into_iter()
            .map(|(kind, price)| {
                let price = match price {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (kind, price)
            })
            .collect();
        Self {
            id: entry.id,
            display_name,
            context_length: entry.context_length.unwrap_or(0),
            pricing,
        }
    }
}

/// Parse a catalog response body.
///
/// # Errors
///
/// Returns [`ProviderError::MalformedResponse`] when the body is not a
/// `{"data": [...]}` catalog.
pub fn parse_models(body: &str) -> Result<Vec<ModelInfo>, ProviderError> {
    let resp: ModelsResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::MalformedResponse {
            provider: ProviderKind::OpenRouter,
            detail: format!("model catalog did not parse: {e}"),
        })?;
    Ok(resp.data.into_iter().map(ModelInfo::from).collect())
}

/// Fetch the live OpenRouter catalog.
///
/// # Errors
///
/// See [`fetch_models_from`].
pub async fn fetch_models(
    client: &reqwest::Client,
    api_key: &str,
) -> Result<Vec<ModelInfo>, ProviderError> {
    fetch_models_from(client, OPENROUTER_MODELS_URL, api_key).await
}

/// The catalog `GET` with bearer auth and the identifying headers.
pub fn catalog_request(url: &str, api_key: &str) -> HttpRequestSpec {
    HttpRequestSpec::get(url)
        .header("authorization", format!("Bearer {api_key}"))
        .header("HTTP-Referer", HTTP_REFERER)
        .header("X-Title", X_TITLE)
}

/// Fetch a model catalog from an explicit URL.
///
/// # Errors
///
/// Returns a configuration error for an empty key, a network error when the
/// call fails, a malformed-response error naming an invalid key or endpoint
/// when an HTML page comes back, a status error for other non-2xx
/// responses, and a malformed-response error for non-JSON bodies.
pub async fn fetch_models_from(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
) -> Result<Vec<ModelInfo>, ProviderError> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(ProviderError::missing_key(ProviderKind::OpenRouter));
    }

    let request = catalog_request(url, api_key);
    let mut builder = client.request(request.method.clone(), &request.url);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    let response = builder
        .send()
        .await
        .map_err(|e| ProviderError::Network {
            provider: ProviderKind::OpenRouter,
            message: format!("Failed to fetch OpenRouter models from {url}: {e}"),
        })?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let body = response.text().await.map_err(|e| ProviderError::Network {
        provider: ProviderKind::OpenRouter,
        message: format!("Failed to read OpenRouter model catalog: {e}"),
    })?;
    debug!(status = status.as_u16(), content_type = %content_type, "model catalog response");

    if looks_like_html(&content_type, &body) {
        return Err(ProviderError::MalformedResponse {
            provider: ProviderKind::OpenRouter,
            detail: format!(
                "received an HTML page instead of JSON (status {}): the API key or endpoint is invalid",
                status.as_u16()
            ),
        });
    }
    if !status.is_success() {
        return Err(status_error(
            ProviderKind::OpenRouter,
            url,
            status.as_u16(),
            &body,
        ));
    }
    if !content_type.contains("json") {
        return Err(ProviderError::MalformedResponse {
            provider: ProviderKind::OpenRouter,
            detail: format!("expected a JSON model catalog, got content type '{content_type}'"),
        });
    }

    parse_models(&body)
}

fn looks_like_html(content_type: &str, body: &str) -> bool {
    if content_type.contains("text/html") {
        return true;
    }
    let head = body.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Fixed catalog used when the live catalog cannot be fetched.
pub fn fallback_models() -> Vec<ModelInfo> {
    [
        ("openai/gpt-4o-mini", "OpenAI: GPT-4o mini", 128_000),
        ("openai/gpt-4o", "OpenAI: GPT-4o", 128_000),
        (
            "anthropic/claude-3.5-sonnet",
            "Anthropic: Claude 3.5 Sonnet",
            200_000,
        ),
        ("google/gemini-flash-1.5", "Google: Gemini Flash 1.5", 1_000_000),
        (
            "meta-llama/llama-3.1-70b-instruct",
            "Meta: Llama 3.1 70B Instruct",
            131_072,
        ),
        ("deepseek/deepseek-chat", "DeepSeek: DeepSeek V3", 64_000),
    ]
    .into_iter()
    .map(|(id, name, context_length)| ModelInfo {
        id: id.to_owned(),
        display_name: name.to_owned(),
        context_length,
        pricing: BTreeMap::new(),
    })
    .collect()
}
