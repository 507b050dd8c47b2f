//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific calls. Streaming and non-streaming completions are
//! the same contract: [`collect_stream`] buffers a stream into one string and
//! optionally forwards whole paragraphs to a callback as they complete.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use super::message::{ChatRequest, ChatResponse};
use crate::error::AgentError;

/// Stream of text increments from a completion.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer for a specific provider
/// while presenting a uniform interface to agents.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`, `"ollama"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError>;

    /// Executes a streaming chat completion request.
    ///
    /// Returns a stream of text chunks as they arrive from the provider.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on connection or streaming failures.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<TextStream, AgentError>;
}

/// Drains `stream` into one string. Each time a newline completes a
/// paragraph, the non-blank paragraph is handed to `on_paragraph`; the
/// trailing partial paragraph is flushed at the end.
///
/// # Errors
///
/// Returns the first [`AgentError::Stream`] yielded by the stream, or
/// [`AgentError::StreamInterrupted`] when paragraphs were already handed
/// out before it.
pub async fn collect_stream<F>(mut stream: TextStream, on_paragraph: &F) -> Result<String, AgentError>
where
    F: Fn(&str) + Send + Sync + ?Sized,
{
    let mut full = String::new();
    let mut pending = String::new();
    let mut emitted = 0;
    while let Some(piece) = stream.next().await {
        let piece = match piece {
            Ok(piece) => piece,
            Err(e) if emitted > 0 => {
                return Err(AgentError::StreamInterrupted {
                    message: e.to_string(),
                    emitted,
                });
            }
            Err(e) => return Err(e),
        };
        full.push_str(&piece);
        pending.push_str(&piece);
        while let Some(pos) = pending.find('\n') {
            let paragraph: String = pending.drain(..=pos).collect();
            let trimmed = paragraph.trim();
            if !trimmed.is_empty() {
                on_paragraph(trimmed);
                emitted += 1;
            }
        }
    }
    let rest = pending.trim();
    if !rest.is_empty() {
        on_paragraph(rest);
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn stream_of(pieces: Vec<Result<String, AgentError>>) -> TextStream {
        Box::pin(futures_util::stream::iter(pieces))
    }

    #[tokio::test]
    async fn test_collect_stream_emits_paragraphs() {
        let seen = Mutex::new(Vec::new());
        let pieces = ["# Ti", "tle\nFirst par", "agraph.\n\nSecond", " one"]
            .into_iter()
            .map(|s| Ok(s.to_string()))
            .collect();
        let full = collect_stream(stream_of(pieces), &|p| {
            if let Ok(mut seen) = seen.lock() {
                seen.push(p.to_string());
            }
        })
        .await
        .unwrap_or_default();
        assert_eq!(full, "# Title\nFirst paragraph.\n\nSecond one");
        let seen = seen.into_inner().unwrap_or_default();
        assert_eq!(seen, vec!["# Title", "First paragraph.", "Second one"]);
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_errors() {
        let pieces = vec![
            Ok("partial".to_string()),
            Err(AgentError::Stream {
                message: "reset".to_string(),
            }),
        ];
        let result = collect_stream(stream_of(pieces), &|_| {}).await;
        assert!(matches!(result, Err(AgentError::Stream { .. })));
    }

    #[tokio::test]
    async fn test_failure_after_emitting_is_not_retryable() {
        let pieces = vec![
            Ok("First paragraph.\n".to_string()),
            Err(AgentError::Stream {
                message: "reset".to_string(),
            }),
        ];
        let count = Mutex::new(0);
        let result = collect_stream(stream_of(pieces), &|_| {
            if let Ok(mut count) = count.lock() {
                *count += 1;
            }
        })
        .await;
        let Err(err) = result else { unreachable!() };
        assert!(matches!(err, AgentError::StreamInterrupted { emitted: 1, .. }));
        assert!(!err.is_retryable());
        assert_eq!(count.into_inner().unwrap_or_default(), 1);
    }
}
