//! Agent trait definition.
//!
//! Every role agent (persona, sub-query, relevance, writer, synthesizer)
//! implements this trait. Call sites go through [`run_with_retry`] so a
//! failing call is retried a bounded number of times before the caller
//! substitutes its fallback.

use std::sync::Arc;

use async_trait::async_trait;

use super::message::{ChatRequest, TokenUsage, system_message, user_message};
use super::prompt::strip_code_fence;
use super::provider::{LlmProvider, collect_stream};
use crate::error::AgentError;
use crate::retry::RetryPolicy;

/// Paragraph callback used when streaming.
pub type ParagraphSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Response from an agent execution.
#[derive(Debug, Clone, Default)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role with a system prompt and model
/// configuration.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Builds the request for `user_msg`.
    fn request(&self, user_msg: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
            stream,
        }
    }

    /// Executes the agent with the given user message.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    async fn execute(&self, provider: &dyn LlmProvider, user_msg: &str) -> Result<AgentResponse, AgentError> {
        let response = provider.chat(&self.request(user_msg, false)).await?;
        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }

    /// Executes the agent in streaming mode, handing each completed
    /// paragraph to `on_paragraph` as it arrives. Usage is not reported by
    /// streaming endpoints and comes back zeroed.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection or stream failures.
    async fn execute_stream(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
        on_paragraph: ParagraphSink,
    ) -> Result<AgentResponse, AgentError> {
        let stream = provider.chat_stream(&self.request(user_msg, true)).await?;
        let content = collect_stream(stream, &*on_paragraph).await?;
        Ok(AgentResponse {
            content,
            usage: TokenUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Runs `call` under `policy`, converting exhaustion of a retryable error
/// into [`AgentError::RetriesExhausted`]. Non-retryable errors pass through
/// unchanged after the first attempt.
///
/// # Errors
///
/// Returns the non-retryable error, or [`AgentError::RetriesExhausted`].
pub async fn run_with_retry<T, F, Fut>(agent: &'static str, policy: &RetryPolicy, call: F) -> Result<T, AgentError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, AgentError>>,
{
    match policy.run(agent, AgentError::is_retryable, call).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_retryable() => Err(AgentError::RetriesExhausted {
            agent,
            attempts: policy.max_attempts.max(1),
            last_error: e.to_string(),
        }),
        Err(e) => Err(e),
    }
}

/// Parses a JSON agent response, tolerating a markdown code fence.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] naming `what` on invalid JSON.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(content: &str, what: &str) -> Result<T, AgentError> {
    serde_json::from_str(strip_code_fence(content)).map_err(|e| AgentError::ResponseParse {
        message: format!("failed to parse {what}: {e}"),
        content: content.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_run_with_retry_wraps_exhaustion() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AgentError> = run_with_retry("writer", &RetryPolicy::immediate(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::ApiRequest {
                message: "overloaded".to_string(),
                status: Some(503),
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let Err(AgentError::RetriesExhausted { agent, attempts, last_error }) = result else {
            unreachable!()
        };
        assert_eq!(agent, "writer");
        assert_eq!(attempts, 3);
        assert!(last_error.contains("overloaded"));
    }

    #[tokio::test]
    async fn test_run_with_retry_passes_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AgentError> = run_with_retry("writer", &RetryPolicy::immediate(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::ApiRequest {
                message: "bad key".to_string(),
                status: Some(401),
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AgentError::ApiRequest { status: Some(401), .. })));
    }
}
