//! Usage accounting around an [`LlmProvider`].
//!
//! Every completion that passes through [`MeteredProvider`] records its
//! token count and cost into the run's [`ResearchPlan`]. Streaming
//! endpoints report no usage, so streamed calls are estimated from text
//! length at roughly four characters per token.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use super::config::AgentConfig;
use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::{LlmProvider, TextStream};
use crate::error::AgentError;
use crate::planner::{COST, ResearchPlan, TOKENS};

const CHARS_PER_TOKEN: usize = 4;

fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.len().div_ceil(CHARS_PER_TOKEN)).unwrap_or(u32::MAX)
}

/// Provider wrapper that books usage into a plan.
pub struct MeteredProvider {
    inner: Arc<dyn LlmProvider>,
    plan: Arc<ResearchPlan>,
    pricing: Arc<AgentConfig>,
}

impl MeteredProvider {
    /// Wraps `inner`, pricing calls with `config`'s per-1K rates.
    #[must_use]
    pub fn new(inner: Arc<dyn LlmProvider>, plan: Arc<ResearchPlan>, config: &AgentConfig) -> Self {
        Self {
            inner,
            plan,
            pricing: Arc::new(config.clone()),
        }
    }

    fn book(plan: &ResearchPlan, pricing: &AgentConfig, usage: TokenUsage) {
        let cost = pricing.cost_of(usage);
        for (name, amount) in [(TOKENS, f64::from(usage.total_tokens)), (COST, cost)] {
            if let Err(e) = plan.record_usage(name, amount) {
                tracing::warn!(budget = name, error = %e, "usage not recorded");
            }
        }
    }
}

impl std::fmt::Debug for MeteredProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeteredProvider")
            .field("inner", &self.inner.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for MeteredProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let response = self.inner.chat(request).await?;
        let usage = if response.usage.total_tokens == 0 {
            let prompt_tokens: u32 = request.messages.iter().map(|m| estimate_tokens(&m.content)).sum();
            let completion_tokens = estimate_tokens(&response.content);
            TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens.saturating_add(completion_tokens),
            }
        } else {
            response.usage
        };
        Self::book(&self.plan, &self.pricing, usage);
        tracing::debug!(model = %request.model, tokens = usage.total_tokens, "completion metered");
        Ok(response)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError> {
        let stream = self.inner.chat_stream(request).await?;
        let prompt_tokens: u32 = request.messages.iter().map(|m| estimate_tokens(&m.content)).sum();
        Self::book(
            &self.plan,
            &self.pricing,
            TokenUsage {
                prompt_tokens,
                completion_tokens: 0,
                total_tokens: prompt_tokens,
            },
        );
        let plan = Arc::clone(&self.plan);
        let pricing = Arc::clone(&self.pricing);
        let metered = stream.inspect(move |piece| {
            if let Ok(text) = piece {
                let completion_tokens = estimate_tokens(text);
                Self::book(
                    &plan,
                    &pricing,
                    TokenUsage {
                        prompt_tokens: 0,
                        completion_tokens,
                        total_tokens: completion_tokens,
                    },
                );
            }
        });
        Ok(Box::pin(metered))
    }
}
