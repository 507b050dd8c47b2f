//! # research-rs
//!
//! An autonomous research agent. Given a question, it:
//!
//! 1. picks a writing persona and plans sub-queries,
//! 2. runs one retrieval iteration per sub-query concurrently, scraping
//!    links and deduplicating URLs across the whole run,
//! 3. curates the collected sources (relevance, scoring, thresholds,
//!    diversity),
//! 4. merges them into one context, and
//! 5. writes a report through staged LLM calls, drafting long reports section
//!    by section over context narrowed with a vector store.
//!
//! Budgets on tokens, web calls and cost cap the work; when one runs out the
//! run skips ahead and returns what it has. LLM and retrieval failures
//! degrade into warnings on the [`ResearchOutcome`] instead of errors.
//!
//! ## Example
//!
//! ```no_run
//! use research_rs::{AgentConfig, Researcher, RunConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let agents = AgentConfig::builder().from_env().build()?;
//! let researcher = Researcher::builder(RunConfig::default(), agents).build()?;
//! let outcome = researcher.run("What are the biggest trends in AI lately?").await?;
//! println!("{}", outcome.report_text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod curation;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod retriever;
pub mod retry;
pub mod scraper;
pub mod vectorstore;

pub use agent::{AgentConfig, LlmProvider, PromptSet};
pub use config::RunConfig;
pub use core::{Query, Report, ReportSource, ReportType, SourceRecord, Tone};
pub use error::{ResearchError, Result};
pub use pipeline::{ChannelSink, ProgressEvent, ProgressSink, ResearchOutcome, Researcher, TracingSink};
pub use planner::{BudgetLimits, ResearchPlan};
