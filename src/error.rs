//! Error types for research-rs.
//!
//! Each layer has its own `thiserror` enum. [`ResearchError`] is the
//! top-level type returned by the pipeline and only carries fail-fast
//! conditions; everything recoverable is downgraded to a warning on the
//! run outcome instead.

use thiserror::Error;

/// Convenience alias for results carrying a [`ResearchError`].
pub type Result<T> = std::result::Result<T, ResearchError>;

/// Top-level error for a research run.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The query was rejected before any work started.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Why the query was rejected.
        message: String,
    },

    /// Run configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Retriever or scraper construction error.
    #[error(transparent)]
    Retriever(#[from] RetrieverError),

    /// LLM client error that could not be degraded.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Budget ledger misuse.
    #[error(transparent)]
    Planner(#[from] PlannerError),
}

/// Errors raised by the LLM client layer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key was configured for a provider that needs one.
    #[error("API key missing: set OPENAI_API_KEY or RESEARCH_API_KEY")]
    ApiKeyMissing,

    /// The configured provider identifier is not registered.
    #[error("unsupported LLM provider '{name}' (supported: {supported})")]
    UnsupportedProvider {
        /// Requested provider name.
        name: String,
        /// Comma-separated list of registered providers.
        supported: String,
    },

    /// The provider returned an error or could not be reached.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error text.
        message: String,
        /// HTTP status code, when known.
        status: Option<u16>,
    },

    /// A streaming response failed mid-stream.
    #[error("stream error: {message}")]
    Stream {
        /// Stream error text.
        message: String,
    },

    /// A stream failed after some of its paragraphs were forwarded. Not
    /// retried, since a second attempt would forward them again.
    #[error("stream interrupted after {emitted} paragraph(s): {message}")]
    StreamInterrupted {
        /// Stream error text.
        message: String,
        /// Paragraphs forwarded before the failure.
        emitted: usize,
    },

    /// The model output did not match the expected shape.
    #[error("response parse error: {message}")]
    ResponseParse {
        /// Parse diagnostic.
        message: String,
        /// Raw model output.
        content: String,
    },

    /// Every retry attempt failed.
    #[error("{agent} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Agent name.
        agent: &'static str,
        /// Attempts made.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },
}

impl AgentError {
    /// Whether another attempt could succeed. Configuration problems and
    /// client errors other than rate limiting are permanent.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::ApiRequest { status, .. } => match status {
                Some(code) => *code == 408 || *code == 429 || *code >= 500,
                None => true,
            },
            Self::Stream { .. } | Self::ResponseParse { .. } => true,
            Self::ApiKeyMissing
            | Self::UnsupportedProvider { .. }
            | Self::StreamInterrupted { .. }
            | Self::RetriesExhausted { .. } => false,
        }
    }
}

/// Errors raised by retriever and scraper adapters.
///
/// Transient network failures never surface here: adapters degrade them to
/// empty results. Only misconfiguration does.
#[derive(Debug, Error)]
pub enum RetrieverError {
    /// A mandatory credential is absent.
    #[error("retriever '{retriever}' requires the {variable} credential")]
    MissingCredential {
        /// Retriever identifier.
        retriever: String,
        /// Option or environment variable that must be set.
        variable: String,
    },

    /// A required non-credential option is absent or invalid.
    #[error("retriever '{retriever}' is misconfigured: {message}")]
    Misconfigured {
        /// Retriever identifier.
        retriever: String,
        /// What is wrong.
        message: String,
    },

    /// The retriever identifier is not registered.
    #[error("unknown retriever '{name}' (supported: {supported})")]
    UnknownRetriever {
        /// Requested retriever name.
        name: String,
        /// Comma-separated list of registered retrievers.
        supported: String,
    },

    /// A scraper was requested by a name that is not registered.
    #[error("unknown scraper '{name}' (supported: {supported})")]
    UnknownScraper {
        /// Requested scraper name.
        name: String,
        /// Comma-separated list of registered scrapers.
        supported: String,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(String),
}

/// Errors raised inside the curation engine. They never reach the caller:
/// the engine falls back to a simpler pass instead.
#[derive(Debug, Error)]
pub enum CurationError {
    /// The primary relevance filter failed.
    #[error("relevance filter failed: {0}")]
    Relevance(String),

    /// The filter returned a verdict count that does not match the input.
    #[error("relevance filter returned {got} verdicts for {expected} sources")]
    VerdictMismatch {
        /// Sources submitted.
        expected: usize,
        /// Verdicts returned.
        got: usize,
    },
}

/// Errors raised by the research planner ledger.
#[derive(Debug, Error, PartialEq)]
pub enum PlannerError {
    /// Usage can never be credited back.
    #[error("invalid usage for budget '{budget}': amount {amount} is negative")]
    InvalidUsage {
        /// Budget name.
        budget: String,
        /// Rejected amount.
        amount: f64,
    },
}

/// Errors raised while parsing run configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A recognized option had a value that could not be parsed.
    #[error("invalid value '{value}' for option '{key}': {reason}")]
    InvalidOption {
        /// Option key.
        key: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_message() {
        let err = RetrieverError::MissingCredential {
            retriever: "tavily".to_string(),
            variable: "TAVILY_API_KEY".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "retriever 'tavily' requires the TAVILY_API_KEY credential"
        );
    }

    #[test]
    fn test_research_error_from_config() {
        let err: ResearchError = ConfigError::invalid("total_words", "abc", "not a number").into();
        assert!(matches!(err, ResearchError::Config(_)));
        assert!(err.to_string().contains("total_words"));
    }

    #[test]
    fn test_agent_error_retryability() {
        let rate_limited = AgentError::ApiRequest {
            message: "slow down".to_string(),
            status: Some(429),
        };
        let unauthorized = AgentError::ApiRequest {
            message: "no".to_string(),
            status: Some(401),
        };
        assert!(rate_limited.is_retryable());
        assert!(!unauthorized.is_retryable());
        assert!(!AgentError::ApiKeyMissing.is_retryable());
    }

    #[test]
    fn test_unsupported_provider_lists_supported() {
        let err = AgentError::UnsupportedProvider {
            name: "foo".to_string(),
            supported: "ollama, openai".to_string(),
        };
        assert!(err.to_string().contains("ollama, openai"));
    }
}
