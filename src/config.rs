//! Settings loading.
//!
//! Loads settings from `~/.testsmith/config.toml` (or `$TESTSMITH_CONFIG_PATH`).
//! Environment variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::framework::{self, FrameworkDescriptor, DEFAULT_FRAMEWORK_ID};
use crate::prompt::PromptOptions;
use crate::providers::{ModelSettings, ProviderConfig, ProviderKind};

/// Name of the settings directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".testsmith";
/// Settings file name inside the settings directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Env var naming an explicit settings file.
pub const CONFIG_PATH_ENV: &str = "TESTSMITH_CONFIG_PATH";

/// Env var holding each provider's API key.
const API_KEY_ENV: [(ProviderKind, &str); 6] = [
    (ProviderKind::OpenAi, "TESTSMITH_OPENAI_API_KEY"),
    (ProviderKind::Anthropic, "TESTSMITH_ANTHROPIC_API_KEY"),
    (ProviderKind::DeepSeek, "TESTSMITH_DEEPSEEK_API_KEY"),
    (ProviderKind::Groq, "TESTSMITH_GROQ_API_KEY"),
    (ProviderKind::OpenRouter, "TESTSMITH_OPENROUTER_API_KEY"),
    (ProviderKind::Custom, "TESTSMITH_CUSTOM_API_KEY"),
];

// ── Top-level settings ──────────────────────────────────────────

/// User settings loaded from TOML.
#[derive(Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Target framework id, e.g. `playwright-js`.
    pub framework: String,
    /// Active provider.
    pub provider: ProviderKind,
    /// Ask for step comments in generated code.
    pub include_comments: bool,
    /// Ask for the Page Object Model pattern.
    pub use_page_object_model: bool,
    /// Whole-request timeout for provider calls.
    pub request_timeout_secs: Option<u64>,
    /// API keys by provider id.
    pub api_keys: BTreeMap<String, String>,
    /// Selected models by provider id.
    pub models: BTreeMap<String, String>,
    /// Self-hosted server.
    pub local: LocalSettings,
    /// OpenRouter gateway.
    pub openrouter: OpenRouterSettings,
    /// User-defined endpoint.
    pub custom: CustomSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            framework: DEFAULT_FRAMEWORK_ID.to_owned(),
            provider: ProviderKind::OpenAi,
            include_comments: true,
            use_page_object_model: false,
            request_timeout_secs: None,
            api_keys: BTreeMap::new(),
            models: BTreeMap::new(),
            local: LocalSettings::default(),
            openrouter: OpenRouterSettings::default(),
            custom: CustomSettings::default(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key_names: Vec<&String> = self.api_keys.keys().collect();
        f.debug_struct("Settings")
            .field("framework", &self.framework)
            .field("provider", &self.provider)
            .field("include_comments", &self.include_comments)
            .field("use_page_object_model", &self.use_page_object_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("api_keys", &key_names)
            .field("models", &self.models)
            .field("local", &self.local)
            .field("openrouter", &self.openrouter)
            .field("custom", &self.custom)
            .finish()
    }
}

impl Settings {
    /// Load from a TOML file only, no env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading settings from file");
                toml::from_str(&contents)
                    .with_context(|| format!("failed to parse settings at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no settings file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read settings at {}: {e}",
                path.display()
            )),
        }
    }

    /// Parse a TOML string into settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse settings TOML")
    }

    /// Resolve the settings file path using a custom env resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
        if let Some(path) = env(CONFIG_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            return Ok(PathBuf::from(path));
        }
        Ok(config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests need not touch the process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("TESTSMITH_PROVIDER") {
            match v.parse::<ProviderKind>() {
                Ok(kind) => self.provider = kind,
                Err(_) => tracing::warn!(
                    var = "TESTSMITH_PROVIDER",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TESTSMITH_FRAMEWORK") {
            self.framework = v;
        }

        for (kind, var) in API_KEY_ENV {
            if let Some(key) = env(var) {
                match kind {
                    ProviderKind::OpenRouter => self.openrouter.api_key = Some(key),
                    ProviderKind::Custom => self.custom.api_key = Some(key),
                    _ => {
                        self.api_keys.insert(kind.id().to_owned(), key);
                    }
                }
            }
        }

        if let Some(v) = env("TESTSMITH_LOCAL_ENDPOINT") {
            self.local.endpoint = Some(v);
        }
        if let Some(v) = env("TESTSMITH_LOCAL_MODEL") {
            self.local.model = Some(v);
        }
    }

    /// Provider configuration for `kind`, assembled from these settings.
    pub fn provider_config(&self, kind: ProviderKind) -> ProviderConfig {
        let hosted = || ModelSettings {
            api_key: self.api_keys.get(kind.id()).cloned(),
            model: self.models.get(kind.id()).cloned(),
            temperature: None,
            max_tokens: None,
        };
        match kind {
            ProviderKind::OpenAi => ProviderConfig::OpenAi(hosted()),
            ProviderKind::Anthropic => ProviderConfig::Anthropic(hosted()),
            ProviderKind::DeepSeek => ProviderConfig::DeepSeek(hosted()),
            ProviderKind::Groq => ProviderConfig::Groq(hosted()),
            ProviderKind::Local => ProviderConfig::Local {
                endpoint: self.local.endpoint.clone(),
                settings: ModelSettings {
                    api_key: None,
                    model: self.local.model.clone(),
                    temperature: self.local.temperature,
                    max_tokens: self.local.max_tokens,
                },
            },
            ProviderKind::OpenRouter => ProviderConfig::OpenRouter(ModelSettings {
                api_key: self
                    .openrouter
                    .api_key
                    .clone()
                    .or_else(|| self.api_keys.get(kind.id()).cloned()),
                model: self
                    .openrouter
                    .model
                    .clone()
                    .or_else(|| self.models.get(kind.id()).cloned()),
                temperature: self.openrouter.temperature,
                max_tokens: self.openrouter.max_tokens,
            }),
            ProviderKind::Custom => ProviderConfig::Custom {
                base_url: self.custom.base_url.clone(),
                headers: self.custom.headers.clone(),
                settings: ModelSettings {
                    api_key: self
                        .custom
                        .api_key
                        .clone()
                        .or_else(|| self.api_keys.get(kind.id()).cloned()),
                    model: self.custom.model.clone(),
                    temperature: self.custom.temperature,
                    max_tokens: self.custom.max_tokens,
                },
            },
        }
    }

    /// Provider configuration for the active provider.
    pub fn active_provider_config(&self) -> ProviderConfig {
        self.provider_config(self.provider)
    }

    /// The configured framework.
    ///
    /// # Errors
    ///
    /// Returns an error if the framework id is unknown.
    pub fn framework_descriptor(&self) -> Result<&'static FrameworkDescriptor> {
        framework::find(&self.framework)
            .ok_or_else(|| anyhow::anyhow!("unknown framework '{}'", self.framework))
    }

    /// Prompt switches derived from these settings.
    pub fn prompt_options(&self) -> PromptOptions {
        PromptOptions {
            include_comments: self.include_comments,
            use_page_object_model: self.use_page_object_model,
        }
    }

    /// Request timeout, when configured and non-zero.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

// ── Provider sections ───────────────────────────────────────────

/// Self-hosted server settings (`[local]`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalSettings {
    /// Base URL, e.g. `http://localhost:11434` or `http://localhost:1234/v1`.
    pub endpoint: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token limit.
    pub max_tokens: Option<u32>,
}

/// OpenRouter settings (`[openrouter]`).
#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenRouterSettings {
    /// API key.
    pub api_key: Option<String>,
    /// Model id, e.g. `openai/gpt-4o`.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token limit.
    pub max_tokens: Option<u32>,
}

impl fmt::Debug for OpenRouterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "__REDACTED__"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// User-defined OpenAI-compatible endpoint (`[custom]`).
#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CustomSettings {
    /// Base URL; `/chat/completions` is appended.
    pub base_url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token limit.
    pub max_tokens: Option<u32>,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
}

impl fmt::Debug for CustomSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header_names: Vec<&String> = self.headers.keys().collect();
        f.debug_struct("CustomSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "__REDACTED__"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("headers", &header_names)
            .finish()
    }
}

/// Resolve the default settings directory (`~/.testsmith/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(CONFIG_DIR_NAME))
}

// ── Tests ───────────────────────────────────────────────────────
