//! Provider registry and factory.
//!
//! Maps provider names to concrete [`LlmProvider`] bindings. Every built-in
//! provider speaks the OpenAI chat-completions protocol, so the registry
//! only records where each one lives and which variable holds its key.

use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Static description of a registered provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Registry identifier.
    pub name: &'static str,
    /// Default API base URL; `None` uses the SDK default.
    pub base_url: Option<&'static str>,
    /// Environment variable holding the API key; `None` if no key is needed.
    pub key_var: Option<&'static str>,
}

const PROVIDERS: &[ProviderSpec] = &[
    ProviderSpec {
        name: "openai",
        base_url: None,
        key_var: Some("OPENAI_API_KEY"),
    },
    ProviderSpec {
        name: "openrouter",
        base_url: Some("https://openrouter.ai/api/v1"),
        key_var: Some("OPENROUTER_API_KEY"),
    },
    ProviderSpec {
        name: "groq",
        base_url: Some("https://api.groq.com/openai/v1"),
        key_var: Some("GROQ_API_KEY"),
    },
    ProviderSpec {
        name: "deepseek",
        base_url: Some("https://api.deepseek.com/v1"),
        key_var: Some("DEEPSEEK_API_KEY"),
    },
    ProviderSpec {
        name: "together",
        base_url: Some("https://api.together.xyz/v1"),
        key_var: Some("TOGETHER_API_KEY"),
    },
    ProviderSpec {
        name: "ollama",
        base_url: Some("http://localhost:11434/v1"),
        key_var: None,
    },
];

/// Looks up a provider by name (case-insensitive).
#[must_use]
pub fn provider_spec(name: &str) -> Option<&'static ProviderSpec> {
    let needle = name.trim().to_lowercase();
    PROVIDERS.iter().find(|p| p.name == needle)
}

/// Registered provider names, sorted.
#[must_use]
pub fn supported_providers() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = PROVIDERS.iter().map(|p| p.name).collect();
    names.sort_unstable();
    names
}

/// Creates an [`LlmProvider`] based on the configured provider name.
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names,
/// listing the supported ones.
pub fn create_provider(config: &AgentConfig) -> Result<Arc<dyn LlmProvider>, AgentError> {
    let spec = provider_spec(&config.provider).ok_or_else(|| AgentError::UnsupportedProvider {
        name: config.provider.clone(),
        supported: supported_providers().join(", "),
    })?;
    tracing::debug!(provider = spec.name, base_url = ?config.base_url.as_deref().or(spec.base_url), "creating LLM provider");
    Ok(Arc::new(OpenAiProvider::new(config, spec)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .provider(provider)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_create_openai_provider() {
        let provider = create_provider(&config("openai")).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_compatible_providers_share_binding() {
        let provider = create_provider(&config("groq")).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn test_create_unknown_provider() {
        let mut cfg = config("openai");
        cfg.provider = "unknown".to_string();
        let Err(AgentError::UnsupportedProvider { name, supported }) = create_provider(&cfg) else {
            unreachable!()
        };
        assert_eq!(name, "unknown");
        assert_eq!(supported, "deepseek, groq, ollama, openai, openrouter, together");
    }

    #[test]
    fn test_provider_spec_lookup() {
        assert_eq!(provider_spec("OpenRouter").map(|p| p.name), Some("openrouter"));
        assert_eq!(provider_spec("ollama").and_then(|p| p.key_var), None);
        assert!(provider_spec("bard").is_none());
    }
}
