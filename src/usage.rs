//! Approximate token and cost accounting for generation requests.
//!
//! Token counts are estimated at one token per four characters and prices
//! come from a small built-in table. Figures are indicative only.
//!
//! Records are appended to a JSON-lines file, one object per line.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::providers::ProviderKind;

/// File name of the usage log inside the data directory.
pub const USAGE_FILE_NAME: &str = "usage.jsonl";

/// Characters per estimated token.
const CHARS_PER_TOKEN: usize = 4;

/// USD per one million tokens, `(model prefix, input, output)`.
///
/// The longest matching prefix wins.
const PRICES: [(&str, f64, f64); 10] = [
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
    ("claude-3-5-sonnet", 3.00, 15.00),
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude-3-opus", 15.00, 75.00),
    ("deepseek-chat", 0.27, 1.10),
    ("deepseek-coder", 0.27, 1.10),
    ("llama-3.3-70b", 0.59, 0.79),
];

/// Estimate the token count of a text.
pub fn estimate_tokens(text: &str) -> u32 {
    let tokens = text.chars().count().div_ceil(CHARS_PER_TOKEN);
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// Input and output price per million tokens for a model, if known.
///
/// OpenRouter ids such as `openai/gpt-4o` are matched on the part after
/// the vendor prefix.
pub fn price_per_million(model: &str) -> Option<(f64, f64)> {
    let model = model.rsplit('/').next().unwrap_or(model);
    PRICES
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len())
        .map(|(_, input, output)| (*input, *output))
}

/// Estimated cost in USD; zero for unknown and local models.
pub fn estimate_cost(
    provider: ProviderKind,
    model: &str,
    prompt_tokens: u32,
    completion_tokens: u32,
) -> f64 {
    if provider == ProviderKind::Local {
        return 0.0;
    }
    match price_per_million(model) {
        Some((input, output)) => {
            (f64::from(prompt_tokens) * input + f64::from(completion_tokens) * output) / 1_000_000.0
        }
        None => 0.0,
    }
}

/// One generation request as seen by usage accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// When the request finished.
    pub timestamp: DateTime<Utc>,
    /// Provider that served it.
    pub provider: ProviderKind,
    /// Model that served it.
    pub model: String,
    /// Estimated prompt tokens.
    pub prompt_tokens: u32,
    /// Estimated completion tokens.
    pub completion_tokens: u32,
    /// Estimated cost in USD.
    pub estimated_cost_usd: f64,
    /// Whether generation succeeded.
    pub success: bool,
}

impl UsageRecord {
    /// Build a record from the prompt sent and the text received.
    pub fn estimate(
        provider: ProviderKind,
        model: &str,
        prompt: &str,
        completion: &str,
        success: bool,
    ) -> Self {
        let prompt_tokens = estimate_tokens(prompt);
        let completion_tokens = estimate_tokens(completion);
        Self {
            timestamp: Utc::now(),
            provider,
            model: model.to_owned(),
            prompt_tokens,
            completion_tokens,
            estimated_cost_usd: estimate_cost(provider, model, prompt_tokens, completion_tokens),
            success,
        }
    }
}

/// Totals for one provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProviderUsage {
    /// Requests made.
    pub requests: u64,
    /// Requests that failed.
    pub failures: u64,
    /// Estimated prompt tokens.
    pub prompt_tokens: u64,
    /// Estimated completion tokens.
    pub completion_tokens: u64,
    /// Estimated cost in USD.
    pub estimated_cost_usd: f64,
}

/// Aggregate records per provider.
pub fn summarize(records: &[UsageRecord]) -> BTreeMap<ProviderKind, ProviderUsage> {
    let mut totals: BTreeMap<ProviderKind, ProviderUsage> = BTreeMap::new();
    for record in records {
        let entry = totals.entry(record.provider).or_default();
        entry.requests = entry.requests.saturating_add(1);
        if !record.success {
            entry.failures = entry.failures.saturating_add(1);
        }
        entry.prompt_tokens = entry
            .prompt_tokens
            .saturating_add(u64::from(record.prompt_tokens));
        entry.completion_tokens = entry
            .completion_tokens
            .saturating_add(u64::from(record.completion_tokens));
        entry.estimated_cost_usd += record.estimated_cost_usd;
    }
    totals
}

/// Append-only JSON-lines sink for [`UsageRecord`]s.
pub struct UsageLog {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl UsageLog {
    /// Open (creating if needed) the usage file at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
        })
    }

    /// Create a usage log over an arbitrary writer (for testing).
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Append one record as a JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn append(&self, record: &UsageRecord) -> anyhow::Result<()> {
        let line = serde_json::to_string(record)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("usage log lock poisoned: {e}"))?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Read every record from a usage file.
///
/// A missing file yields no records. Malformed lines are skipped with a
/// warning.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_records(path: &Path) -> anyhow::Result<Vec<UsageRecord>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (index, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<UsageRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %path.display(),
                line = index.saturating_add(1),
                error = %e,
                "skipping malformed usage record"
            ),
        }
    }
    Ok(records)
}
