//! Report writing agent.
//!
//! Drafts report bodies, sections, introductions and conclusions in
//! markdown. The system prompt is the run's persona role prompt.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::AgentConfig;
use super::provider::LlmProvider;
use super::traits::{Agent, AgentResponse, ParagraphSink, run_with_retry};
use crate::error::AgentError;
use crate::retry::RetryPolicy;

/// Agent that writes markdown prose.
pub struct WriterAgent {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system_prompt: String,
}

impl WriterAgent {
    /// Creates a writer on the smart model with `role_prompt` as its system prompt.
    #[must_use]
    pub fn new(config: &AgentConfig, role_prompt: String) -> Self {
        Self {
            model: config.smart_model.clone(),
            max_tokens: config.smart_max_tokens,
            temperature: config.temperature,
            system_prompt: role_prompt,
        }
    }

    /// Writes a response to `user_msg`, streaming paragraphs to `on_paragraph`
    /// when one is given. An empty completion counts as a failed attempt.
    /// A stream that breaks after forwarding paragraphs is not retried.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] once retries are exhausted.
    pub async fn write(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
        retry: &RetryPolicy,
        on_paragraph: Option<ParagraphSink>,
    ) -> Result<AgentResponse, AgentError> {
        let on_paragraph = on_paragraph.as_ref();
        run_with_retry(self.name(), retry, || async {
            let response = match on_paragraph {
                Some(sink) => self.execute_stream(provider, user_msg, Arc::clone(sink)).await?,
                None => self.execute(provider, user_msg).await?,
            };
            if response.content.trim().is_empty() {
                return Err(AgentError::ResponseParse {
                    message: "empty completion".to_string(),
                    content: String::new(),
                });
            }
            Ok(response)
        })
        .await
    }
}

#[async_trait]
impl Agent for WriterAgent {
    fn name(&self) -> &'static str {
        "writer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
