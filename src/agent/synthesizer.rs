//! Structured synthesis agents.
//!
//! The outline agent plans the section headings of a long report; the
//! frame agent produces the title, table of contents, introduction,
//! conclusion and citation list in one JSON-constrained call.

use async_trait::async_trait;
use serde::Deserialize;

use super::config::AgentConfig;
use super::provider::LlmProvider;
use super::traits::{Agent, AgentResponse, parse_json, run_with_retry};
use crate::core::SourceCitation;
use crate::error::AgentError;
use crate::retry::RetryPolicy;

#[derive(Deserialize)]
struct OutlinePayload {
    sections: Vec<String>,
}

/// Agent that outlines a long report.
pub struct OutlineAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl OutlineAgent {
    /// Creates the agent on the strategic model.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.strategic_model.clone(),
            max_tokens: config.strategic_max_tokens,
            system_prompt,
        }
    }

    /// Returns at most `max_sections` non-empty headings.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] once retries are exhausted.
    pub async fn outline(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
        max_sections: usize,
        retry: &RetryPolicy,
    ) -> Result<(Vec<String>, AgentResponse), AgentError> {
        run_with_retry(self.name(), retry, || async {
            let response = self.execute(provider, user_msg).await?;
            let sections = Self::parse_outline(&response.content, max_sections)?;
            Ok((sections, response))
        })
        .await
    }

    fn parse_outline(content: &str, max_sections: usize) -> Result<Vec<String>, AgentError> {
        let payload: OutlinePayload = parse_json(content, "outline")?;
        let sections: Vec<String> = payload
            .sections
            .into_iter()
            .map(|s| s.trim().trim_start_matches('#').trim().to_string())
            .filter(|s| !s.is_empty())
            .take(max_sections)
            .collect();
        if sections.is_empty() {
            return Err(AgentError::ResponseParse {
                message: "outline has no sections".to_string(),
                content: content.to_string(),
            });
        }
        Ok(sections)
    }
}

#[async_trait]
impl Agent for OutlineAgent {
    fn name(&self) -> &'static str {
        "outline"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

/// Structured frame of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportFrame {
    /// Report title.
    #[serde(default)]
    pub title: String,
    /// Body headings in order.
    #[serde(default)]
    pub table_of_contents: Vec<String>,
    /// Short introduction.
    #[serde(default)]
    pub introduction: String,
    /// Short conclusion.
    #[serde(default)]
    pub conclusion: String,
    /// Cited sources.
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

/// Agent that produces the report frame.
pub struct FrameAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl FrameAgent {
    /// Creates the agent on the strategic model.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.strategic_model.clone(),
            max_tokens: config.strategic_max_tokens,
            system_prompt,
        }
    }

    /// Produces the frame for the report described in `user_msg`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] once retries are exhausted.
    pub async fn frame(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
        retry: &RetryPolicy,
    ) -> Result<(ReportFrame, AgentResponse), AgentError> {
        run_with_retry(self.name(), retry, || async {
            let response = self.execute(provider, user_msg).await?;
            let frame: ReportFrame = parse_json(&response.content, "report frame")?;
            Ok((frame, response))
        })
        .await
    }
}

#[async_trait]
impl Agent for FrameAgent {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn json_mode(&self) -> bool {
        true
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
