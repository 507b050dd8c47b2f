//! CLI command implementations.
//!
//! Each command returns the text to print; `main` decides where it goes.

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result, anyhow, bail};
use serde_json::json;

use crate::agent::{AgentConfig, PromptSet, supported_providers};
use crate::cli::parser::{Cli, Commands};
use crate::config::RunConfig;
use crate::pipeline::{ProgressSink, ResearchOutcome, Researcher, TracingSink, validate_query};
use crate::retriever::RetrieverRegistry;
use crate::retry::RetryPolicy;
use crate::scraper::ScraperRegistry;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text; markdown for reports.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything other than `json` is text.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    match &cli.command {
        Commands::Run {
            query,
            provider,
            smart_model,
            prompt_dir,
            output,
            ..
        } => {
            validate_query(query)?;
            let config = run_config(&cli.command.run_options())?;
            let mut agents = AgentConfig::builder();
            if let Some(provider) = provider {
                agents = agents.provider(provider);
            }
            if let Some(model) = smart_model {
                agents = agents.smart_model(model);
            }
            if let Some(dir) = prompt_dir {
                agents = agents.prompt_dir(dir);
            }
            let agents = agents.from_env().build().context("LLM client configuration")?;
            cmd_run(query, config, agents, output.as_deref(), format).await
        }
        Commands::InitPrompts { dir } => cmd_init_prompts(dir.as_deref(), format),
        Commands::Providers => cmd_providers(format),
    }
}

/// Environment configuration with `options` applied on top, validated.
///
/// # Errors
///
/// Returns an error for a malformed value or an invalid combination.
pub fn run_config(options: &[(String, String)]) -> Result<RunConfig> {
    let mut config = RunConfig::from_env()?;
    for (key, value) in options {
        if !config.set(key, value)? {
            tracing::warn!(key = %key, "ignoring unrecognized run option");
        }
    }
    config.validate()?;
    Ok(config)
}

async fn cmd_run(
    query: &str,
    config: RunConfig,
    agents: AgentConfig,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<String> {
    let sink: Arc<dyn ProgressSink> = Arc::new(TracingSink);
    let researcher = Researcher::builder(config, agents).sink(Arc::clone(&sink)).build()?;

    let outcome = tokio::select! {
        outcome = researcher.run(query) => outcome?,
        _ = tokio::signal::ctrl_c() => bail!("interrupted"),
    };
    if let Some(error) = &outcome.error {
        tracing::error!(error = %error, "research run aborted; returning the partial report");
    }

    let rendered = match format {
        OutputFormat::Text => outcome.report_text.clone(),
        OutputFormat::Json => serde_json::to_string_pretty(&outcome)?,
    };
    let Some(path) = output else {
        return Ok(ensure_newline(rendered));
    };

    tokio::fs::write(path, &rendered)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    sink.path(&path.display().to_string());
    Ok(summary(&outcome, path, format))
}

fn summary(outcome: &ResearchOutcome, path: &Path, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => ensure_newline(
            json!({
                "path": path.display().to_string(),
                "final_state": outcome.final_state,
                "sources": outcome.sources.len(),
                "warnings": outcome.warnings,
                "total_tokens": outcome.total_tokens,
                "total_cost": outcome.total_cost,
            })
            .to_string(),
        ),
        OutputFormat::Text => {
            let mut text = format!(
                "Wrote report to: {}\nSources: {}  Tokens: {}  Cost: ${:.4}\n",
                path.display(),
                outcome.sources.len(),
                outcome.total_tokens,
                outcome.total_cost
            );
            for warning in &outcome.warnings {
                let _ = writeln!(text, "  warning: {warning}");
            }
            text
        }
    }
}

fn cmd_init_prompts(dir: Option<&Path>, format: OutputFormat) -> Result<String> {
    let target_dir = dir
        .map(PathBuf::from)
        .or_else(PromptSet::default_dir)
        .ok_or_else(|| anyhow!("could not determine home directory for the default prompt path"))?;

    let written = PromptSet::write_defaults(&target_dir)
        .with_context(|| format!("failed to write prompt templates to {}", target_dir.display()))?;

    match format {
        OutputFormat::Text => {
            if written.is_empty() {
                return Ok(format!(
                    "All prompt templates already exist in: {}\n",
                    target_dir.display()
                ));
            }
            let mut output = format!(
                "Wrote {} prompt template(s) to: {}\n",
                written.len(),
                target_dir.display()
            );
            for path in &written {
                let _ = writeln!(output, "  {}", path.display());
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(ensure_newline(
            json!({
                "directory": target_dir.display().to_string(),
                "written": written.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
            })
            .to_string(),
        )),
    }
}

fn cmd_providers(format: OutputFormat) -> Result<String> {
    let llm = supported_providers();
    let registry = RetrieverRegistry::with_defaults();
    let retrievers = registry.names();
    let scraper_registry = ScraperRegistry::with_defaults(std::time::Duration::from_secs(20), RetryPolicy::default())?;
    let scrapers = scraper_registry.names();

    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            let _ = writeln!(output, "LLM providers: {}", llm.join(", "));
            let _ = writeln!(output, "Retrievers:    {}", retrievers.join(", "));
            let _ = writeln!(output, "Scrapers:      {}", scrapers.join(", "));
            Ok(output)
        }
        OutputFormat::Json => Ok(ensure_newline(
            json!({
                "llm_providers": llm,
                "retrievers": retrievers,
                "scrapers": scrapers,
            })
            .to_string(),
        )),
    }
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
