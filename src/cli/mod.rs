//! CLI layer for research-rs.
//!
//! A thin clap adapter over [`crate::pipeline::Researcher`]: `run` researches
//! a question, `init-prompts` writes the default prompt templates and
//! `providers` lists what is registered.

pub mod commands;
pub mod parser;

pub use commands::{OutputFormat, execute, run_config};
pub use parser::{Cli, Commands};
