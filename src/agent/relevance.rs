//! Relevance judging agent.
//!
//! Labels a batch of candidate sources with a [`Relevance`] level each.

use async_trait::async_trait;
use serde::Deserialize;

use super::config::AgentConfig;
use super::prompt::{SourceExcerpt, build_relevance_prompt};
use super::provider::LlmProvider;
use super::traits::{Agent, AgentResponse, parse_json, run_with_retry};
use crate::core::Relevance;
use crate::error::AgentError;
use crate::retry::RetryPolicy;

/// A source shown to the judge.
pub type Candidate<'a> = SourceExcerpt<'a>;

/// The judge's label for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    /// Candidate id from the batch.
    pub id: usize,
    /// Assigned relevance.
    pub relevance: Relevance,
}

#[derive(Deserialize)]
struct RawVerdict {
    id: usize,
    relevance: String,
}

#[derive(Deserialize)]
struct VerdictPayload {
    verdicts: Vec<RawVerdict>,
}

/// Agent that judges source relevance.
pub struct RelevanceAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl RelevanceAgent {
    /// Creates the agent on the fast model.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.fast_model.clone(),
            max_tokens: config.fast_max_tokens,
            system_prompt,
        }
    }

    /// Judges every candidate. Verdicts for unknown ids are dropped; a
    /// missing id is left for the caller to detect.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] once retries are exhausted.
    pub async fn judge(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        candidates: &[Candidate<'_>],
        retry: &RetryPolicy,
    ) -> Result<(Vec<Verdict>, AgentResponse), AgentError> {
        let user_msg = build_relevance_prompt(query, candidates);
        run_with_retry(self.name(), retry, || async {
            let response = self.execute(provider, &user_msg).await?;
            let verdicts = Self::parse_verdicts(&response.content, candidates.len())?;
            Ok((verdicts, response))
        })
        .await
    }

    fn parse_verdicts(content: &str, batch_len: usize) -> Result<Vec<Verdict>, AgentError> {
        let payload: VerdictPayload = parse_json(content, "relevance verdicts")?;
        Ok(payload
            .verdicts
            .into_iter()
            .filter(|v| v.id < batch_len)
            .map(|v| Verdict {
                id: v.id,
                relevance: Relevance::parse(&v.relevance),
            })
            .collect())
    }
}

#[async_trait]
impl Agent for RelevanceAgent {
    fn name(&self) -> &'static str {
        "relevance"
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
