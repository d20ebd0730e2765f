//! Generation entry point: prompt, dispatch, clean.
//!
//! [`Generator::generate`] validates the provider configuration, renders
//! the prompt, dispatches it and cleans the answer. Success and failure
//! both carry the request-scoped call log of the attempts made.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::cleaner::clean_response;
use crate::framework::FrameworkDescriptor;
use crate::prompt::{build_prompt, system_prompt, PromptOptions};
use crate::providers::calllog::{CallLog, CallLogBook};
use crate::providers::dispatcher::Dispatcher;
use crate::providers::{Provider, ProviderConfig, ProviderError, ProviderKind};
use crate::types::GenerationRequest;
use crate::usage::UsageRecord;

/// Generated test code and how it was obtained.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedArtifact {
    /// Unique artifact id.
    pub id: Uuid,
    /// Cleaned source code.
    pub source_text: String,
    /// Provider that produced it.
    pub provider: ProviderKind,
    /// Model that produced it.
    pub model: String,
    /// Completion time.
    pub generated_at: DateTime<Utc>,
    /// Every HTTP attempt made.
    pub request_log: Vec<CallLog>,
    /// Estimated token usage.
    pub usage: UsageRecord,
}

/// A generation that did not produce code.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{error}")]
pub struct GenerationFailure {
    /// What went wrong.
    #[serde(serialize_with = "serialize_error")]
    pub error: ProviderError,
    /// Provider that was targeted.
    pub provider: ProviderKind,
    /// Model that was targeted.
    pub model: String,
    /// Failure time.
    pub generated_at: DateTime<Utc>,
    /// Every HTTP attempt made; empty when validation failed.
    pub request_log: Vec<CallLog>,
    /// Estimated token usage.
    pub usage: UsageRecord,
}

fn serialize_error<S: serde::Serializer>(
    error: &ProviderError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct as _;
    let mut state = serializer.serialize_struct("ProviderError", 2)?;
    state.serialize_field("kind", &error.kind())?;
    state.serialize_field("message", &error.to_string())?;
    state.end()
}

/// Drives prompt building, dispatch and cleaning.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    dispatcher: Dispatcher,
}

impl Generator {
    /// Generator over an existing dispatcher.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Validate `config` and generate a test for `request`.
    ///
    /// Validation failures return before any network access, with an
    /// empty request log.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationFailure`] carrying the typed provider error.
    pub async fn generate(
        &self,
        config: &ProviderConfig,
        request: &GenerationRequest,
        framework: &FrameworkDescriptor,
        options: PromptOptions,
    ) -> Result<GeneratedArtifact, GenerationFailure> {
        match Provider::from_config(config) {
            Ok(provider) => {
                self.generate_with(&provider, request, framework, options)
                    .await
            }
            Err(error) => {
                let model = config.effective_model();
                Err(GenerationFailure {
                    usage: UsageRecord::estimate(config.kind(), &model, "", "", false),
                    error,
                    provider: config.kind(),
                    model,
                    generated_at: Utc::now(),
                    request_log: Vec::new(),
                })
            }
        }
    }

    /// Generate with an already validated provider.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationFailure`] carrying the typed provider error.
    #[instrument(skip_all, fields(provider = provider.kind().id(), framework = framework.id))]
    pub async fn generate_with(
        &self,
        provider: &Provider,
        request: &GenerationRequest,
        framework: &FrameworkDescriptor,
        options: PromptOptions,
    ) -> Result<GeneratedArtifact, GenerationFailure> {
        let system = system_prompt(framework);
        let prompt = build_prompt(request, framework, options);
        let mut log = CallLogBook::new();

        let result = self
            .dispatcher
            .dispatch(provider, &system, &prompt, &mut log)
            .await;
        let kind = provider.kind();
        let model = provider.model().to_owned();
        let prompt_text = format!("{system}\n{prompt}");

        match result {
            Ok(raw) => {
                let source_text = clean_response(&raw);
                info!(
                    model = %model,
                    raw_chars = raw.chars().count(),
                    cleaned_chars = source_text.chars().count(),
                    "test code generated"
                );
                Ok(GeneratedArtifact {
                    id: Uuid::new_v4(),
                    usage: UsageRecord::estimate(kind, &model, &prompt_text, &raw, true),
                    source_text,
                    provider: kind,
                    model,
                    generated_at: Utc::now(),
                    request_log: log.into_entries(),
                })
            }
            Err(error) => Err(GenerationFailure {
                usage: UsageRecord::estimate(kind, &model, &prompt_text, "", false),
                error,
                provider: kind,
                model,
                generated_at: Utc::now(),
                request_log: log.into_entries(),
            }),
        }
    }
}
