//! LLM provider abstraction layer.
//!
//! Every supported backend is one variant of the closed [`Provider`] enum.
//! Each variant wraps an adapter implementing [`ProviderAdapter`], the
//! "build request / extract content" pair the [`dispatcher::Dispatcher`]
//! drives:
//! - [`openai::OpenAiProvider`]: OpenAI, DeepSeek and Groq chat completions
//! - [`anthropic::AnthropicProvider`]: Anthropic `/v1/messages`
//! - [`local::LocalProvider`]: self-hosted servers (OpenAI-compatible or Ollama-style)
//! - [`openrouter::OpenRouterProvider`]: OpenRouter gateway, plus its model catalog
//! - [`custom::CustomProvider`]: user-defined OpenAI-compatible endpoint

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod anthropic;
pub mod calllog;
pub mod custom;
pub mod dispatcher;
pub mod local;
pub mod openai;
pub mod openrouter;

use anthropic::AnthropicProvider;
use custom::CustomProvider;
use local::LocalProvider;
use openai::OpenAiProvider;
use openrouter::OpenRouterProvider;

/// Sampling temperature used when the settings leave it unset.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Output token limit used when the settings leave it unset.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// ---------------------------------------------------------------------------
// Provider kinds
// ---------------------------------------------------------------------------

/// The LLM backend family a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions.
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// DeepSeek (OpenAI-compatible hosted chat).
    DeepSeek,
    /// Groq (OpenAI-compatible hosted chat).
    Groq,
    /// Self-hosted model server.
    Local,
    /// OpenRouter model aggregator.
    OpenRouter,
    /// User-defined OpenAI-compatible endpoint.
    Custom,
}

impl ProviderKind {
    /// Every provider kind, in display order.
    pub const ALL: [ProviderKind; 7] = [
        Self::OpenAi,
        Self::Anthropic,
        Self::DeepSeek,
        Self::Groq,
        Self::Local,
        Self::OpenRouter,
        Self::Custom,
    ];

    /// Stable identifier used in settings files and on the command line.
    pub fn id(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::DeepSeek => "deepseek",
            Self::Groq => "groq",
            Self::Local => "local",
            Self::OpenRouter => "openrouter",
            Self::Custom => "custom",
        }
    }

    /// Human-readable provider name used in error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::DeepSeek => "DeepSeek",
            Self::Groq => "Groq",
            Self::Local => "Local LLM",
            Self::OpenRouter => "OpenRouter",
            Self::Custom => "Custom provider",
        }
    }

    /// Model used when none is selected. Only hosted chat providers have one.
    pub fn default_model(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("gpt-4o-mini"),
            Self::Anthropic => Some("claude-3-5-sonnet-20241022"),
            Self::DeepSeek => Some("deepseek-chat"),
            Self::Groq => Some("llama-3.3-70b-versatile"),
            Self::Local | Self::OpenRouter | Self::Custom => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == needle)
            .ok_or_else(|| ProviderError::Configuration(format!("unknown provider '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-provider model selection and credentials.
#[derive(Clone, Default, PartialEq)]
pub struct ModelSettings {
    /// API key, if the provider needs one.
    pub api_key: Option<String>,
    /// Selected model identifier.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token limit.
    pub max_tokens: Option<u32>,
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl ModelSettings {
    /// The API key with surrounding whitespace removed, if non-empty.
    pub fn key(&self) -> Option<&str> {
        non_empty(self.api_key.as_deref())
    }

    /// The selected model, if non-empty.
    pub fn model_name(&self) -> Option<&str> {
        non_empty(self.model.as_deref())
    }

    /// Temperature, falling back to [`DEFAULT_TEMPERATURE`].
    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Token limit, falling back to [`DEFAULT_MAX_TOKENS`].
    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

/// Provider configuration, discriminated by provider kind.
///
/// Loaded from settings at call time; the core only reads it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    /// OpenAI chat completions.
    OpenAi(ModelSettings),
    /// Anthropic messages API.
    Anthropic(ModelSettings),
    /// DeepSeek chat completions.
    DeepSeek(ModelSettings),
    /// Groq chat completions.
    Groq(ModelSettings),
    /// Self-hosted model server.
    Local {
        /// Base endpoint URL, e.g. `http://localhost:11434`.
        endpoint: Option<String>,
        /// Model selection.
        settings: ModelSettings,
    },
    /// OpenRouter gateway.
    OpenRouter(ModelSettings),
    /// User-defined OpenAI-compatible endpoint.
    Custom {
        /// Base URL; `/chat/completions` is appended.
        base_url: Option<String>,
        /// Extra request headers.
        headers: BTreeMap<String, String>,
        /// Model selection and credentials.
        settings: ModelSettings,
    },
}

impl ProviderConfig {
    /// Provider kind of this configuration.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Anthropic(_) => ProviderKind::Anthropic,
            Self::DeepSeek(_) => ProviderKind::DeepSeek,
            Self::Groq(_) => ProviderKind::Groq,
            Self::Local { .. } => ProviderKind::Local,
            Self::OpenRouter(_) => ProviderKind::OpenRouter,
            Self::Custom { .. } => ProviderKind::Custom,
        }
    }

    /// Shared model settings of this configuration.
    pub fn settings(&self) -> &ModelSettings {
        match self {
            Self::OpenAi(s)
            | Self::Anthropic(s)
            | Self::DeepSeek(s)
            | Self::Groq(s)
            | Self::OpenRouter(s) => s,
            Self::Local { settings, .. } | Self::Custom { settings, .. } => settings,
        }
    }

    /// Model that would serve a request, including provider defaults.
    pub fn effective_model(&self) -> String {
        self.settings()
            .model_name()
            .or_else(|| self.kind().default_model())
            .unwrap_or_default()
            .to_owned()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Taxonomy tag attached to every [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required credential, endpoint or model missing.
    Configuration,
    /// Provider rejected the credentials (401/403).
    Authentication,
    /// Endpoint or model not found (404).
    NotFound,
    /// Provider rate limit hit (429).
    RateLimit,
    /// Provider-side failure (5xx).
    Server,
    /// Any other non-success status.
    HttpStatus,
    /// Response body lacked every recognized content field.
    MalformedResponse,
    /// The HTTP call itself failed.
    Network,
}

/// Errors returned by the provider dispatcher.
///
/// Every variant renders as a single user-facing message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Required configuration missing; no request was sent.
    #[error("{0}")]
    Configuration(String),
    /// Provider returned 401 or 403.
    #[error("{provider} authentication failed ({status}): check your API key and permissions. {detail}")]
    Authentication {
        /// Provider that rejected the call.
        provider: ProviderKind,
        /// HTTP status code.
        status: u16,
        /// Provider-supplied error detail.
        detail: String,
    },
    /// Provider returned 404.
    #[error("{provider} endpoint not found (404) at {url}: check the endpoint URL and model name. {detail}")]
    NotFound {
        /// Provider that returned the status.
        provider: ProviderKind,
        /// URL that was not found.
        url: String,
        /// Provider-supplied error detail.
        detail: String,
    },
    /// Provider returned 429.
    #[error("{provider} rate limit exceeded (429): wait a moment or check your plan quota. {detail}")]
    RateLimited {
        /// Provider that throttled the call.
        provider: ProviderKind,
        /// Provider-supplied error detail.
        detail: String,
    },
    /// Provider returned 5xx.
    #[error("{provider} server error ({status}): {body}")]
    Server {
        /// Provider that failed.
        provider: ProviderKind,
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Provider returned another non-success status.
    #[error("{provider} request failed with status {status}: {body}")]
    HttpStatus {
        /// Provider that returned the status.
        provider: ProviderKind,
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },
    /// Success status without any recognized content.
    #[error("unexpected response format from {provider}: {detail}")]
    MalformedResponse {
        /// Provider that answered.
        provider: ProviderKind,
        /// What was wrong with the body.
        detail: String,
    },
    /// Transport-level failure.
    #[error("{message}")]
    Network {
        /// Provider that could not be reached.
        provider: ProviderKind,
        /// User-facing description.
        message: String,
    },
}

impl ProviderError {
    /// Taxonomy tag for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Server { .. } => ErrorKind::Server,
            Self::HttpStatus { .. } => ErrorKind::HttpStatus,
            Self::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Self::Network { .. } => ErrorKind::Network,
        }
    }

    /// Missing API key for a provider.
    pub fn missing_key(provider: ProviderKind) -> Self {
        Self::Configuration(format!(
            "{provider} API key not configured. Add it to your settings before generating."
        ))
    }
}

/// Translate a non-success HTTP status into a typed error.
pub fn status_error(provider: ProviderKind, url: &str, status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Authentication {
            provider,
            status,
            detail: error_detail(body),
        },
        404 => ProviderError::NotFound {
            provider,
            url: url.to_owned(),
            detail: error_detail(body),
        },
        429 => ProviderError::RateLimited {
            provider,
            detail: error_detail(body),
        },
        500..=599 => ProviderError::Server {
            provider,
            status,
            body: sanitize_http_error_body(body),
        },
        _ => ProviderError::HttpStatus {
            provider,
            status,
            body: sanitize_http_error_body(body),
        },
    }
}

/// Pull the human-readable message out of a provider error body.
///
/// Understands `{"error":{"message":..}}`, `{"error":".."}` and
/// `{"message":..}`; anything else is returned sanitized.
pub fn error_detail(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .or_else(|| value.get("message").and_then(Value::as_str))
    });
    match message {
        Some(message) => sanitize_http_error_body(message),
        None => sanitize_http_error_body(body),
    }
}

/// Collapse whitespace, redact token-like strings and truncate an error body.
pub fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"sk-ant-[A-Za-z0-9_\-]{10,}",
        r"sk-or-[A-Za-z0-9_\-]{10,}",
        r"sk-[A-Za-z0-9]{32,}",
        r"gsk_[A-Za-z0-9]{20,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}

// ---------------------------------------------------------------------------
// Outbound requests and content extraction
// ---------------------------------------------------------------------------

/// One outbound HTTP request, fully described before it is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestSpec {
    /// HTTP method (`POST` or `GET`).
    pub method: reqwest::Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers in send order.
    pub headers: Vec<(String, String)>,
    /// JSON body; `None` for bodiless requests.
    pub body: Option<Value>,
}

impl HttpRequestSpec {
    /// A JSON `POST` request.
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: reqwest::Method::POST,
            url: url.into(),
            headers: vec![("content-type".to_owned(), "application/json".to_owned())],
            body: Some(body),
        }
    }

    /// A bodiless `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Append a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of the first header with this name, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A named way of locating generated text inside a JSON response.
///
/// Providers list these in a fixed order; the first one that yields a
/// string wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionStrategy {
    /// `choices[0].message.content` (OpenAI chat shape).
    ChatMessageContent,
    /// `choices[0].text` (legacy completions shape).
    LegacyChoiceText,
    /// `content[0].text` (Anthropic messages shape).
    ContentBlockText,
    /// Top-level `response` (Ollama generate shape).
    Response,
    /// Top-level `content`.
    Content,
    /// Top-level `text`.
    Text,
}

impl ExtractionStrategy {
    /// JSON path this strategy reads, for logs and error messages.
    pub fn path(self) -> &'static str {
        match self {
            Self::ChatMessageContent => "choices[0].message.content",
            Self::LegacyChoiceText => "choices[0].text",
            Self::ContentBlockText => "content[0].text",
            Self::Response => "response",
            Self::Content => "content",
            Self::Text => "text",
        }
    }

    /// Apply this strategy to a parsed body.
    pub fn extract(self, body: &Value) -> Option<&str> {
        let found = match self {
            Self::ChatMessageContent => body.pointer("/choices/0/message/content"),
            Self::LegacyChoiceText => body.pointer("/choices/0/text"),
            Self::ContentBlockText => body.pointer("/content/0/text"),
            Self::Response => body.get("response"),
            Self::Content => body.get("content"),
            Self::Text => body.get("text"),
        };
        found.and_then(Value::as_str)
    }
}

/// Try each strategy in order, returning the first match.
pub fn extract_content<'a>(
    body: &'a Value,
    strategies: &[ExtractionStrategy],
) -> Option<(ExtractionStrategy, &'a str)> {
    strategies
        .iter()
        .find_map(|strategy| strategy.extract(body).map(|text| (*strategy, text)))
}

/// Describe the strategies tried, for malformed-response errors.
pub fn describe_strategies(strategies: &[ExtractionStrategy]) -> String {
    strategies
        .iter()
        .map(|s| s.path())
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Adapter trait and the closed provider set
// ---------------------------------------------------------------------------

/// The capability pair every provider implements.
pub trait ProviderAdapter: Send + Sync {
    /// Provider kind served by this adapter.
    fn kind(&self) -> ProviderKind;

    /// Model identifier sent upstream.
    fn model(&self) -> &str;

    /// Build the first outbound request for a prompt.
    fn build_request(&self, system: &str, prompt: &str) -> HttpRequestSpec;

    /// Build the alternate request tried once after a 404, if any.
    fn fallback_request(&self, _system: &str, _prompt: &str) -> Option<HttpRequestSpec> {
        None
    }

    /// Ordered content extraction strategies for responses.
    fn extraction_strategies(&self) -> &'static [ExtractionStrategy];

    /// Whether an empty extracted string counts as a failure.
    fn rejects_empty_content(&self) -> bool {
        false
    }

    /// Translate a transport failure into a user-facing error.
    fn network_error(&self, url: &str, cause: &str) -> ProviderError {
        ProviderError::Network {
            provider: self.kind(),
            message: format!(
                "Network error contacting {} at {url}: {cause}",
                self.kind()
            ),
        }
    }
}

/// A validated provider, ready for dispatch.
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI, DeepSeek or Groq.
    OpenAi(OpenAiProvider),
    /// Anthropic.
    Anthropic(AnthropicProvider),
    /// Self-hosted server.
    Local(LocalProvider),
    /// OpenRouter gateway.
    OpenRouter(OpenRouterProvider),
    /// User-defined endpoint.
    Custom(CustomProvider),
}

impl Provider {
    /// Validate a configuration and build the matching provider.
    ///
    /// No network access happens here.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Configuration`] when a required key,
    /// endpoint or model is missing or malformed.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        match config {
            ProviderConfig::OpenAi(settings) => {
                OpenAiProvider::from_settings(ProviderKind::OpenAi, settings).map(Self::OpenAi)
            }
            ProviderConfig::DeepSeek(settings) => {
                OpenAiProvider::from_settings(ProviderKind::DeepSeek, settings).map(Self::OpenAi)
            }
            ProviderConfig::Groq(settings) => {
                OpenAiProvider::from_settings(ProviderKind::Groq, settings).map(Self::OpenAi)
            }
            ProviderConfig::Anthropic(settings) => {
                AnthropicProvider::from_settings(settings).map(Self::Anthropic)
            }
            ProviderConfig::Local { endpoint, settings } => {
                LocalProvider::from_settings(endpoint.as_deref(), settings).map(Self::Local)
            }
            ProviderConfig::OpenRouter(settings) => {
                OpenRouterProvider::from_settings(settings).map(Self::OpenRouter)
            }
            ProviderConfig::Custom {
                base_url,
                headers,
                settings,
            } => CustomProvider::from_settings(base_url.as_deref(), headers, settings)
                .map(Self::Custom),
        }
    }

    /// The adapter behind this provider.
    pub fn adapter(&self) -> &dyn ProviderAdapter {
        match self {
            Self::OpenAi(p) => p,
            Self::Anthropic(p) => p,
            Self::Local(p) => p,
            Self::OpenRouter(p) => p,
            Self::Custom(p) => p,
        }
    }

    /// Provider kind.
    pub fn kind(&self) -> ProviderKind {
        self.adapter().kind()
    }

    /// Model identifier sent upstream.
    pub fn model(&self) -> &str {
        self.adapter().model()
    }

    /// Point a hosted provider at a different fixed URL (for integration testing).
    ///
    /// Local and custom providers already take their URL from settings and
    /// are returned unchanged.
    #[doc(hidden)]
    #[must_use]
    pub fn with_endpoint(self, url: impl Into<String>) -> Self {
        match self {
            Self::OpenAi(p) => Self::OpenAi(p.with_endpoint(url)),
            Self::Anthropic(p) => Self::Anthropic(p.with_endpoint(url)),
            Self::OpenRouter(p) => Self::OpenRouter(p.with_endpoint(url)),
            Self::Local(_) | Self::Custom(_) => self,
        }
    }
}

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Validate that a user-supplied base URL is an absolute http(s) URL.
///
/// Returns the URL with trailing slashes removed.
///
/// # Errors
///
/// Returns [`ProviderError::Configuration`] when the URL does not parse or
/// uses another scheme.
pub fn normalize_base_url(provider: ProviderKind, raw: &str) -> Result<String, ProviderError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed).map_err(|e| {
        ProviderError::Configuration(format!("{provider} endpoint '{raw}' is not a valid URL: {e}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ProviderError::Configuration(format!(
            "{provider} endpoint '{raw}' must use http or https"
        )));
    }
    Ok(trimmed.to_owned())
}
