//! Request-scoped audit records of outbound HTTP attempts.
//!
//! A [`CallLogBook`] is created per generation and handed back to the
//! caller with the result; nothing is kept between generations.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::HttpRequestSpec;

/// Header names whose values never reach a call log.
const SECRET_HEADERS: [&str; 3] = ["authorization", "proxy-authorization", "cookie"];
/// Any header whose name contains one of these is treated as a secret.
const SECRET_MARKERS: [&str; 4] = ["key", "token", "secret", "password"];

fn is_secret_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SECRET_HEADERS.contains(&name.as_str()) || SECRET_MARKERS.iter().any(|m| name.contains(m))
}

/// The request half of a [`CallLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedRequest {
    /// Absolute URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Request headers, secrets redacted.
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// When the attempt started.
    pub timestamp: DateTime<Utc>,
}

/// The response half of a [`CallLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: BTreeMap<String, String>,
    /// Raw response body.
    pub body: String,
    /// When the response was fully read.
    pub timestamp: DateTime<Utc>,
    /// Wall time of the attempt in milliseconds.
    pub duration_ms: u64,
}

/// One outbound HTTP attempt and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    /// What was sent.
    pub request: LoggedRequest,
    /// What came back, when the call completed.
    pub response: Option<LoggedResponse>,
    /// Transport error, when the call itself failed.
    pub error: Option<String>,
}

impl CallLog {
    /// True while neither a response nor an error has been recorded.
    pub fn is_pending(&self) -> bool {
        self.response.is_none() && self.error.is_none()
    }
}

/// Handle to an entry opened with [`CallLogBook::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryId(usize);

/// Append-only log of the attempts made for one generation.
#[derive(Debug, Clone, Default)]
pub struct CallLogBook {
    entries: Vec<CallLog>,
}

impl CallLogBook {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt before it is sent.
    pub fn begin(&mut self, request: &HttpRequestSpec) -> EntryId {
        let headers = request
            .headers
            .iter()
            .map(|(name, value)| {
                let value = if is_secret_header(name) {
                    "[REDACTED]".to_owned()
                } else {
                    value.clone()
                };
                (name.to_ascii_lowercase(), value)
            })
            .collect();

        let id = EntryId(self.entries.len());
        self.entries.push(CallLog {
            request: LoggedRequest {
                url: request.url.clone(),
                method: request.method.as_str().to_owned(),
                headers,
                body: request.body.clone(),
                timestamp: Utc::now(),
            },
            response: None,
            error: None,
        });
        id
    }

    /// Attach the response to an open entry.
    pub fn complete(&mut self, id: EntryId, response: LoggedResponse) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.response = Some(response);
        }
    }

    /// Attach a transport error to an open entry.
    pub fn fail(&mut self, id: EntryId, error: impl Into<String>) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.error = Some(error.into());
        }
    }

    /// Entries recorded so far, oldest first.
    pub fn entries(&self) -> &[CallLog] {
        &self.entries
    }

    /// Number of attempts recorded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no attempt has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the book, returning its entries.
    pub fn into_entries(self) -> Vec<CallLog> {
        self.entries
    }
}
