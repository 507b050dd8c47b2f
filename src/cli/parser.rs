//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// research-rs: autonomous research reports from the command line.
///
/// Plans sub-queries, retrieves and curates sources, and writes a
/// long-form report with staged LLM calls.
#[derive(Parser, Debug)]
#[command(name = "research-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging for research-rs.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the report.
    ///
    /// Options not given as flags are read from `RESEARCH_<OPTION>`
    /// environment variables; `--set` accepts any run option.
    #[command(after_help = r#"Examples:
  research-rs run "What are the biggest trends in AI lately?"
  research-rs run "Rust async runtimes" --report-type detailed_report --tone analytical
  research-rs run "EU AI Act" --retriever tavily,arxiv --set web_call_limit=10
  research-rs run "Company handbook summary" --report-source local --set doc_path=./docs
  research-rs --format json run "Solid-state batteries" | jq '.report.sources'
"#)]
    Run {
        /// The research question.
        query: String,

        /// Report type (research_report, detailed_report, deep, ...).
        #[arg(short = 't', long)]
        report_type: Option<String>,

        /// Writing tone (objective, formal, analytical, ...).
        #[arg(long)]
        tone: Option<String>,

        /// Where sources come from (web, local, hybrid, static, vectorstore).
        #[arg(long)]
        report_source: Option<String>,

        /// Retriever identifiers, comma-separated.
        #[arg(short, long, value_delimiter = ',')]
        retriever: Vec<String>,

        /// Target length of the report body in words.
        #[arg(short = 'w', long)]
        total_words: Option<usize>,

        /// Output language.
        #[arg(long)]
        language: Option<String>,

        /// Use this sub-query instead of generating them (repeatable).
        #[arg(long = "sub-query")]
        sub_queries: Vec<String>,

        /// Writing instruction that overrides the report-type default.
        #[arg(long)]
        custom_prompt: Option<String>,

        /// Role prompt that bypasses persona selection.
        #[arg(long)]
        agent_role: Option<String>,

        /// Stream the report body to the progress log as it is written.
        #[arg(long)]
        stream: bool,

        /// Any run option as KEY=VALUE (repeatable).
        #[arg(short, long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// LLM provider (openai, openrouter, groq, deepseek, together, ollama).
        #[arg(long, env = "RESEARCH_LLM_PROVIDER")]
        provider: Option<String>,

        /// Model for report writing.
        #[arg(long)]
        smart_model: Option<String>,

        /// Directory containing prompt template files.
        #[arg(long, env = "RESEARCH_PROMPT_DIR")]
        prompt_dir: Option<PathBuf>,

        /// Write the output to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the default prompt templates to a directory.
    ///
    /// Existing files are left untouched.
    #[command(after_help = r#"Examples:
  research-rs init-prompts                  # ~/.config/research-rs/prompts
  research-rs init-prompts --dir ./prompts  # custom directory
"#)]
    InitPrompts {
        /// Target directory (defaults to ~/.config/research-rs/prompts).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// List registered LLM providers, retrievers and scrapers.
    Providers,
}

impl Commands {
    /// Run options implied by the `run` flags, in the order they apply.
    /// Empty for other commands.
    #[must_use]
    pub fn run_options(&self) -> Vec<(String, String)> {
        let Self::Run {
            report_type,
            tone,
            report_source,
            retriever,
            total_words,
            language,
            sub_queries,
            custom_prompt,
            agent_role,
            stream,
            set,
            ..
        } = self
        else {
            return Vec::new();
        };

        let mut options: Vec<(String, String)> = [
            ("report_type", report_type.clone()),
            ("tone", tone.clone()),
            ("report_source", report_source.clone()),
            ("total_words", total_words.map(|n| n.to_string())),
            ("language", language.clone()),
            ("custom_prompt", custom_prompt.clone()),
            ("agent_role", agent_role.clone()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();

        if !retriever.is_empty() {
            options.push(("retrievers".to_string(), retriever.join(",")));
        }
        if !sub_queries.is_empty() {
            // JSON keeps commas inside a sub-query intact.
            let list = serde_json::to_string(sub_queries).unwrap_or_default();
            options.push(("custom_sub_queries".to_string(), list));
        }
        if *stream {
            options.push(("stream".to_string(), "true".to_string()));
        }
        for pair in set {
            let (key, value) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
            options.push((key.trim().to_string(), value.to_string()));
        }
        options
    }
}
