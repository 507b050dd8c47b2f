//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values, then environment
//! variables, then defaults. Provider-specific defaults (base URL, key
//! variable, whether a key is needed) come from the provider registry.

use std::path::PathBuf;
use std::time::Duration;

use super::client::provider_spec;
use super::message::TokenUsage;
use crate::error::AgentError;
use crate::retry::RetryPolicy;

/// Default model for cheap, high-volume calls (relevance, sub-queries).
const DEFAULT_FAST_MODEL: &str = "gpt-4o-mini";
/// Default model for report writing.
const DEFAULT_SMART_MODEL: &str = "gpt-4.1";
/// Default model for planning and persona selection.
const DEFAULT_STRATEGIC_MODEL: &str = "o4-mini";
/// Default fast-model max tokens.
const DEFAULT_FAST_MAX_TOKENS: u32 = 2000;
/// Default smart-model max tokens. Long enough for a full single-call report.
const DEFAULT_SMART_MAX_TOKENS: u32 = 8000;
/// Default strategic-model max tokens.
const DEFAULT_STRATEGIC_MAX_TOKENS: u32 = 4000;
/// Default sampling temperature for writers.
const DEFAULT_TEMPERATURE: f32 = 0.4;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default max attempts per LLM call.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default initial retry backoff in milliseconds.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Configuration for the LLM client and role agents.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// LLM provider name (e.g., "openai", "ollama").
    pub provider: String,
    /// API key for the provider. Empty for providers that need none.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// Model for relevance judging and sub-query generation.
    pub fast_model: String,
    /// Model for report and section writing.
    pub smart_model: String,
    /// Model for persona selection and structured synthesis.
    pub strategic_model: String,
    /// Maximum tokens for fast-model responses.
    pub fast_max_tokens: u32,
    /// Maximum tokens for smart-model responses.
    pub smart_max_tokens: u32,
    /// Maximum tokens for strategic-model responses.
    pub strategic_max_tokens: u32,
    /// Sampling temperature for writing calls.
    pub temperature: f32,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum attempts per LLM call.
    pub max_retries: u32,
    /// Delay before the second attempt; doubles afterwards.
    pub retry_backoff: Duration,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
    /// Minimum delay before each API request.
    ///
    /// `Duration::ZERO` (default) disables rate limiting.
    pub request_delay: Duration,
    /// USD per 1K prompt tokens, for cost accounting.
    pub prompt_price_per_1k: f64,
    /// USD per 1K completion tokens, for cost accounting.
    pub completion_price_per_1k: f64,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if the provider needs a key
    /// and none is found, or [`AgentError::UnsupportedProvider`].
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env().build()
    }

    /// Retry schedule for LLM call sites.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            initial_backoff: self.retry_backoff,
            max_backoff: self.retry_backoff.saturating_mul(8),
        }
    }

    /// Cost in USD of one call's token usage.
    #[must_use]
    pub fn cost_of(&self, usage: TokenUsage) -> f64 {
        f64::from(usage.prompt_tokens) / 1000.0 * self.prompt_price_per_1k
            + f64::from(usage.completion_tokens) / 1000.0 * self.completion_price_per_1k
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    fast_model: Option<String>,
    smart_model: Option<String>,
    strategic_model: Option<String>,
    fast_max_tokens: Option<u32>,
    smart_max_tokens: Option<u32>,
    strategic_max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff: Option<Duration>,
    prompt_dir: Option<PathBuf>,
    request_delay: Option<Duration>,
    prompt_price_per_1k: Option<f64>,
    completion_price_per_1k: Option<f64>,
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("RESEARCH_LLM_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("RESEARCH_API_KEY").ok().or_else(|| {
                let provider = self.provider.as_deref().unwrap_or("openai");
                provider_spec(provider)
                    .and_then(|spec| spec.key_var)
                    .and_then(|var| std::env::var(var).ok())
            });
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("RESEARCH_BASE_URL")
                .or_else(|_| std::env::var("OPENAI_BASE_URL"))
                .ok();
        }
        if self.fast_model.is_none() {
            self.fast_model = std::env::var("RESEARCH_FAST_LLM").ok();
        }
        if self.smart_model.is_none() {
            self.smart_model = std::env::var("RESEARCH_SMART_LLM").ok();
        }
        if self.strategic_model.is_none() {
            self.strategic_model = std::env::var("RESEARCH_STRATEGIC_LLM").ok();
        }
        if self.temperature.is_none() {
            self.temperature = env_parse("RESEARCH_TEMPERATURE");
        }
        if self.max_retries.is_none() {
            self.max_retries = env_parse("RESEARCH_LLM_MAX_RETRIES");
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("RESEARCH_PROMPT_DIR").ok().map(PathBuf::from);
        }
        if self.prompt_price_per_1k.is_none() {
            self.prompt_price_per_1k = env_parse("RESEARCH_PROMPT_PRICE_PER_1K");
        }
        if self.completion_price_per_1k.is_none() {
            self.completion_price_per_1k = env_parse("RESEARCH_COMPLETION_PRICE_PER_1K");
        }
        self
    }

    /// Sets the LLM provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the fast model.
    #[must_use]
    pub fn fast_model(mut self, model: impl Into<String>) -> Self {
        self.fast_model = Some(model.into());
        self
    }

    /// Sets the smart model.
    #[must_use]
    pub fn smart_model(mut self, model: impl Into<String>) -> Self {
        self.smart_model = Some(model.into());
        self
    }

    /// Sets the strategic model.
    #[must_use]
    pub fn strategic_model(mut self, model: impl Into<String>) -> Self {
        self.strategic_model = Some(model.into());
        self
    }

    /// Sets the fast-model max tokens.
    #[must_use]
    pub const fn fast_max_tokens(mut self, n: u32) -> Self {
        self.fast_max_tokens = Some(n);
        self
    }

    /// Sets the smart-model max tokens.
    #[must_use]
    pub const fn smart_max_tokens(mut self, n: u32) -> Self {
        self.smart_max_tokens = Some(n);
        self
    }

    /// Sets the strategic-model max tokens.
    #[must_use]
    pub const fn strategic_max_tokens(mut self, n: u32) -> Self {
        self.strategic_max_tokens = Some(n);
        self
    }

    /// Sets the writing temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the max attempts per call.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the initial retry backoff.
    #[must_use]
    pub const fn retry_backoff(mut self, delay: Duration) -> Self {
        self.retry_backoff = Some(delay);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Sets the minimum delay before each API request.
    #[must_use]
    pub const fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = Some(delay);
        self
    }

    /// Sets prompt and completion prices per 1K tokens.
    #[must_use]
    pub const fn prices_per_1k(mut self, prompt: f64, completion: f64) -> Self {
        self.prompt_price_per_1k = Some(prompt);
        self.completion_price_per_1k = Some(completion);
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnsupportedProvider`] for unknown providers and
    /// [`AgentError::ApiKeyMissing`] if the provider needs a key and none
    /// was set.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let provider = self
            .provider
            .map_or_else(|| "openai".to_string(), |p| p.trim().to_lowercase());
        let spec = provider_spec(&provider).ok_or_else(|| AgentError::UnsupportedProvider {
            name: provider.clone(),
            supported: super::client::supported_providers().join(", "),
        })?;
        let api_key = match self.api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => key,
            None if spec.key_var.is_none() => String::new(),
            None => return Err(AgentError::ApiKeyMissing),
        };

        Ok(AgentConfig {
            provider,
            api_key,
            base_url: self.base_url,
            fast_model: self.fast_model.unwrap_or_else(|| DEFAULT_FAST_MODEL.to_string()),
            smart_model: self.smart_model.unwrap_or_else(|| DEFAULT_SMART_MODEL.to_string()),
            strategic_model: self
                .strategic_model
                .unwrap_or_else(|| DEFAULT_STRATEGIC_MODEL.to_string()),
            fast_max_tokens: self.fast_max_tokens.unwrap_or(DEFAULT_FAST_MAX_TOKENS),
            smart_max_tokens: self.smart_max_tokens.unwrap_or(DEFAULT_SMART_MAX_TOKENS),
            strategic_max_tokens: self.strategic_max_tokens.unwrap_or(DEFAULT_STRATEGIC_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            timeout: self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_backoff: self
                .retry_backoff
                .unwrap_or(Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS)),
            prompt_dir: self.prompt_dir,
            request_delay: self.request_delay.unwrap_or(Duration::ZERO),
            prompt_price_per_1k: self.prompt_price_per_1k.unwrap_or(0.0),
            completion_price_per_1k: self.completion_price_per_1k.unwrap_or(0.0),
        })
    }
}
