//! Provider dispatch: one outbound call, at most one alternate-endpoint retry.
//!
//! Per call the dispatcher walks
//! `Idle → Sending → {Succeeded, RetryingAlternateEndpoint, Failed}`.
//! Only a 404 from a provider that offers a fallback request (the local
//! provider in `/v1` mode) enters `RetryingAlternateEndpoint`, and the
//! retry itself never retries.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::calllog::{CallLogBook, LoggedResponse};
use super::{
    describe_strategies, extract_content, status_error, ErrorKind, HttpRequestSpec, Provider,
    ProviderAdapter, ProviderError,
};

/// States of a single dispatch, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Not started.
    Idle,
    /// First attempt in flight.
    Sending,
    /// Alternate endpoint attempt in flight.
    RetryingAlternateEndpoint,
    /// Content extracted.
    Succeeded,
    /// Terminal failure.
    Failed,
}

struct RawResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
}

/// Sends provider requests and normalizes their responses.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    /// Dispatcher with a default HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher whose client enforces a whole-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send a prompt to a provider and return the raw generated text.
    ///
    /// Every attempt is appended to `log` before it is sent and completed
    /// with its response or transport error afterwards.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] for non-success statuses, transport
    /// failures and responses without recognizable content.
    pub async fn dispatch(
        &self,
        provider: &Provider,
        system: &str,
        prompt: &str,
        log: &mut CallLogBook,
    ) -> Result<String, ProviderError> {
        let adapter = provider.adapter();
        let kind = adapter.kind();
        debug!(provider = kind.id(), state = ?DispatchState::Idle, "dispatch requested");

        let primary = adapter.build_request(system, prompt);
        info!(
            provider = kind.id(),
            model = adapter.model(),
            url = %primary.url,
            state = ?DispatchState::Sending,
            "sending generation request"
        );

        let result = match self.attempt(adapter, &primary, log).await {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                match adapter.fallback_request(system, prompt) {
                    Some(fallback) => {
                        info!(
                            provider = kind.id(),
                            url = %fallback.url,
                            state = ?DispatchState::RetryingAlternateEndpoint,
                            "endpoint not found, retrying alternate endpoint"
                        );
                        self.attempt(adapter, &fallback, log).await
                    }
                    None => Err(err),
                }
            }
            other => other,
        };

        match &result {
            Ok(text) => info!(
                provider = kind.id(),
                attempts = log.len(),
                chars = text.chars().count(),
                state = ?DispatchState::Succeeded,
                "generation request succeeded"
            ),
            Err(err) => warn!(
                provider = kind.id(),
                attempts = log.len(),
                error_kind = ?err.kind(),
                error = %err,
                state = ?DispatchState::Failed,
                "generation request failed"
            ),
        }
        result
    }

    async fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        request: &HttpRequestSpec,
        log: &mut CallLogBook,
    ) -> Result<String, ProviderError> {
        let entry = log.begin(request);
        let started = Instant::now();

        let raw = match self.send(request).await {
            Ok(raw) => raw,
            Err(err) => {
                let cause = err.to_string();
                log.fail(entry, cause.as_str());
                return Err(adapter.network_error(&request.url, &cause));
            }
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(url = %request.url, status = raw.status, duration_ms, "attempt completed");
        log.complete(
            entry,
            LoggedResponse {
                status: raw.status,
                headers: raw.headers,
                body: raw.body.clone(),
                timestamp: Utc::now(),
                duration_ms,
            },
        );

        if !(200..300).contains(&raw.status) {
            return Err(status_error(
                adapter.kind(),
                &request.url,
                raw.status,
                &raw.body,
            ));
        }

        let body: Value =
            serde_json::from_str(&raw.body).map_err(|e| ProviderError::MalformedResponse {
                provider: adapter.kind(),
                detail: format!("response body is not JSON ({e})"),
            })?;

        let strategies = adapter.extraction_strategies();
        let (strategy, text) = extract_content(&body, strategies).ok_or_else(|| {
            ProviderError::MalformedResponse {
                provider: adapter.kind(),
                detail: format!(
                    "none of the expected fields were present: {}",
                    describe_strategies(strategies)
                ),
            }
        })?;

        if adapter.rejects_empty_content() && text.trim().is_empty() {
            return Err(ProviderError::MalformedResponse {
                provider: adapter.kind(),
                detail: format!("empty content at {}", strategy.path()),
            });
        }

        debug!(strategy = strategy.path(), "content extracted");
        Ok(text.to_owned())
    }

    async fn send(&self, request: &HttpRequestSpec) -> Result<RawResponse, reqwest::Error> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
