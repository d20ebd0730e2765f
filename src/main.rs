//! Testsmith CLI entry point.
//!
//! Provides `generate`, `prompt`, `template`, `models`, `frameworks` and
//! `usage` subcommands. Generated code goes to stdout (or `--output`);
//! logs go to stderr.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Read as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use testsmith::config::{Settings, CONFIG_PATH_ENV};
use testsmith::framework::{self, FrameworkDescriptor, FRAMEWORKS};
use testsmith::generator::Generator;
use testsmith::providers::dispatcher::Dispatcher;
use testsmith::providers::openrouter::{self, ModelInfo};
use testsmith::providers::{ProviderConfig, ProviderKind};
use testsmith::types::GenerationRequest;
use testsmith::usage::{self, UsageLog, USAGE_FILE_NAME};
use testsmith::{logging, prompt, templates};

/// Testsmith: generate browser tests from recorded UI actions.
#[derive(Parser)]
#[command(name = "testsmith", version, about)]
struct Cli {
    /// Settings file (defaults to `$TESTSMITH_CONFIG_PATH` or `~/.testsmith/config.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write JSON logs with daily rotation into this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Generate test code through the configured LLM provider.
    Generate {
        #[command(flatten)]
        input: RequestArgs,
        /// Provider to use instead of the configured one.
        #[arg(long)]
        provider: Option<String>,
        /// Model to use instead of the configured one.
        #[arg(long)]
        model: Option<String>,
        /// Write the code to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the HTTP call log as JSON to stderr.
        #[arg(long)]
        show_log: bool,
    },
    /// Print the prompt that would be sent, without sending it.
    Prompt {
        #[command(flatten)]
        input: RequestArgs,
    },
    /// Render code from a built-in template, without any model call.
    Template {
        #[command(flatten)]
        input: RequestArgs,
        /// Write the code to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List OpenRouter models.
    Models {
        /// Skip the network and print the built-in catalog.
        #[arg(long)]
        offline: bool,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// List supported test frameworks.
    Frameworks,
    /// Summarize recorded token usage per provider.
    Usage,
}

/// Request input shared by generating subcommands.
#[derive(clap::Args)]
struct RequestArgs {
    /// Generation request JSON file; `-` reads stdin.
    #[arg(short, long, default_value = "-")]
    request: PathBuf,
    /// Framework to target instead of the configured one.
    #[arg(short, long)]
    framework: Option<String>,
    /// Scenario text, replacing the one in the request.
    #[arg(short, long)]
    scenario: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let _logging_guard = match &cli.log_dir {
        Some(dir) => Some(logging::init_with_file(dir, default_level)?),
        None => {
            logging::init_cli(default_level);
            None
        }
    };

    let config_path = resolve_config_path(cli.config.as_deref())?;
    load_dotenv(&config_path);
    let mut settings = Settings::load_from(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    settings.apply_overrides(|key| std::env::var(key).ok());
    let data_dir = config_path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    match cli.command {
        Command::Generate {
            input,
            provider,
            model,
            output,
            show_log,
        } => {
            handle_generate(
                &settings,
                &data_dir,
                &input,
                provider.as_deref(),
                model,
                output.as_deref(),
                show_log,
            )
            .await
        }
        Command::Prompt { input } => handle_prompt(&settings, &input),
        Command::Template { input, output } => handle_template(&settings, &input, output.as_deref()),
        Command::Models { offline, json } => handle_models(&settings, offline, json).await,
        Command::Frameworks => {
            handle_frameworks();
            Ok(())
        }
        Command::Usage => handle_usage(&data_dir),
    }
}

/// `--config`, then `$TESTSMITH_CONFIG_PATH`, then `~/.testsmith/config.toml`.
fn resolve_config_path(flag: Option<&Path>) -> anyhow::Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => Settings::config_path_with(|key| std::env::var(key).ok())
            .with_context(|| format!("failed to resolve settings path (set {CONFIG_PATH_ENV})")),
    }
}

/// Load a `.env` next to the settings file, if present.
fn load_dotenv(config_path: &Path) {
    let Some(dir) = config_path.parent() else {
        return;
    };
    let env_file = dir.join(".env");
    if !env_file.exists() {
        return;
    }
    if let Err(e) = dotenvy::from_path(&env_file) {
        warn!(path = %env_file.display(), error = %e, "failed to load .env file");
    }
}

fn read_request(input: &RequestArgs) -> anyhow::Result<GenerationRequest> {
    let json = if input.request.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&input.request)
            .with_context(|| format!("failed to read {}", input.request.display()))?
    };
    let mut request = GenerationRequest::from_json(&json).context("invalid generation request")?;
    if let Some(scenario) = &input.scenario {
        request.scenario = Some(scenario.clone());
    }
    Ok(request)
}

fn resolve_framework(
    settings: &Settings,
    input: &RequestArgs,
) -> anyhow::Result<&'static FrameworkDescriptor> {
    match &input.framework {
        Some(id) => framework::find(id).with_context(|| format!("unknown framework '{id}'")),
        None => settings.framework_descriptor(),
    }
}

fn write_output(code: &str, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, format!("{code}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "code written");
        }
        None => println!("{code}"),
    }
    Ok(())
}

fn with_model(config: ProviderConfig, model: String) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAi(mut s) => {
            s.model = Some(model);
            ProviderConfig::OpenAi(s)
        }
        ProviderConfig::Anthropic(mut s) => {
            s.model = Some(model);
            ProviderConfig::Anthropic(s)
        }
        ProviderConfig::DeepSeek(mut s) => {
            s.model = Some(model);
            ProviderConfig::DeepSeek(s)
        }
        ProviderConfig::Groq(mut s) => {
            s.model = Some(model);
            ProviderConfig::Groq(s)
        }
        ProviderConfig::OpenRouter(mut s) => {
            s.model = Some(model);
            ProviderConfig::OpenRouter(s)
        }
        ProviderConfig::Local {
            endpoint,
            mut settings,
        } => {
            settings.model = Some(model);
            ProviderConfig::Local { endpoint, settings }
        }
        ProviderConfig::Custom {
            base_url,
            headers,
            mut settings,
        } => {
            settings.model = Some(model);
            ProviderConfig::Custom {
                base_url,
                headers,
                settings,
            }
        }
    }
}

async fn handle_generate(
    settings: &Settings,
    data_dir: &Path,
    input: &RequestArgs,
    provider: Option<&str>,
    model: Option<String>,
    output: Option<&Path>,
    show_log: bool,
) -> anyhow::Result<()> {
    let request = read_request(input)?;
    let framework = resolve_framework(settings, input)?;
    let kind = match provider {
        Some(id) => id.parse::<ProviderKind>()?,
        None => settings.provider,
    };
    let mut provider_config = settings.provider_config(kind);
    if let Some(model) = model {
        provider_config = with_model(provider_config, model);
    }

    let dispatcher = match settings.request_timeout() {
        Some(timeout) => {
            Dispatcher::with_timeout(timeout).context("failed to build HTTP client")?
        }
        None => Dispatcher::new(),
    };
    let generator = Generator::new(dispatcher);

    info!(provider = kind.id(), framework = framework.id, "generating test");
    let result = generator
        .generate(&provider_config, &request, framework, settings.prompt_options())
        .await;

    let (usage_record, request_log) = match &result {
        Ok(artifact) => (&artifact.usage, &artifact.request_log),
        Err(failure) => (&failure.usage, &failure.request_log),
    };
    if show_log {
        eprintln!("{}", serde_json::to_string_pretty(request_log)?);
    }
    if !request_log.is_empty() {
        let recorded = UsageLog::open(data_dir.join(USAGE_FILE_NAME))
            .and_then(|log| log.append(usage_record));
        if let Err(e) = recorded {
            warn!(error = %e, "failed to record usage");
        }
    }

    let artifact = result?;
    write_output(&artifact.source_text, output)
}

fn handle_prompt(settings: &Settings, input: &RequestArgs) -> anyhow::Result<()> {
    let request = read_request(input)?;
    let framework = resolve_framework(settings, input)?;
    println!("{}", prompt::build_prompt(&request, framework, settings.prompt_options()));
    Ok(())
}

fn handle_template(
    settings: &Settings,
    input: &RequestArgs,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let request = read_request(input)?;
    let framework = resolve_framework(settings, input)?;
    let code = templates::render(&request, framework, settings.include_comments)?;
    write_output(code.trim_end(), output)
}

async fn handle_models(settings: &Settings, offline: bool, json: bool) -> anyhow::Result<()> {
    let models = if offline {
        openrouter::fallback_models()
    } else {
        let key = settings
            .provider_config(ProviderKind::OpenRouter)
            .settings()
            .key()
            .map(str::to_owned)
            .unwrap_or_default();
        let dispatcher = Dispatcher::new();
        match openrouter::fetch_models(dispatcher.client(), &key).await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "model catalog unavailable, using built-in list");
                openrouter::fallback_models()
            }
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else {
        print_models(&models);
    }
    Ok(())
}

fn print_models(models: &[ModelInfo]) {
    for model in models {
        let context = if model.context_length > 0 {
            format!("{} ctx", model.context_length)
        } else {
            "ctx unknown".to_owned()
        };
        println!("{:<45} {:<40} {context}", model.id, model.display_name);
    }
}

fn handle_frameworks() {
    for entry in &FRAMEWORKS {
        let marker = if entry.id == framework::DEFAULT_FRAMEWORK_ID {
            " (default)"
        } else {
            ""
        };
        println!("{:<18} {}{marker}", entry.id, entry.display_name);
    }
}

fn handle_usage(data_dir: &Path) -> anyhow::Result<()> {
    let path = data_dir.join(USAGE_FILE_NAME);
    let records = usage::read_records(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if records.is_empty() {
        println!("No usage recorded yet.");
        return Ok(());
    }

    println!(
        "{:<18} {:>8} {:>8} {:>12} {:>12} {:>10}",
        "provider", "requests", "failed", "prompt tok", "output tok", "est. USD"
    );
    for (kind, totals) in usage::summarize(&records) {
        println!(
            "{:<18} {:>8} {:>8} {:>12} {:>12} {:>10.4}",
            kind.display_name(),
            totals.requests,
            totals.failures,
            totals.prompt_tokens,
            totals.completion_tokens,
            totals.estimated_cost_usd
        );
    }
    println!("Costs are estimates from built-in prices, not billing data.");
    Ok(())
}
