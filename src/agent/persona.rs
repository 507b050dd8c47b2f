//! Persona (research role) selection agent.
//!
//! Classifies the query into a domain expert persona whose role prompt
//! becomes the system prompt of every writing call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::AgentConfig;
use super::prompt::build_persona_prompt;
use super::provider::LlmProvider;
use super::traits::{Agent, AgentResponse, parse_json, run_with_retry};
use crate::error::AgentError;
use crate::retry::RetryPolicy;

const DEFAULT_SERVER: &str = "Default Agent";
const DEFAULT_ROLE_PROMPT: &str = "You are an AI critical thinker research assistant. Your sole \
    purpose is to write well written, critically acclaimed, objective and structured reports on \
    given text.";

/// A research persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona name, e.g. "Finance Agent".
    pub server: String,
    /// Role prompt used as the writer's system prompt.
    #[serde(rename = "agent_role_prompt")]
    pub role_prompt: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            role_prompt: DEFAULT_ROLE_PROMPT.to_string(),
        }
    }
}

impl Persona {
    /// A persona with an explicit role prompt.
    #[must_use]
    pub fn custom(role_prompt: impl Into<String>) -> Self {
        Self {
            server: "Custom Agent".to_string(),
            role_prompt: role_prompt.into(),
        }
    }
}

/// Agent that picks the persona for a query.
pub struct PersonaAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl PersonaAgent {
    /// Creates the agent on the strategic model.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.strategic_model.clone(),
            max_tokens: config.strategic_max_tokens,
            system_prompt,
        }
    }

    /// Selects the persona for `query`. Malformed output counts as a failed
    /// attempt and is retried.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] once retries are exhausted.
    pub async fn select(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        retry: &RetryPolicy,
    ) -> Result<(Persona, AgentResponse), AgentError> {
        let user_msg = build_persona_prompt(query);
        run_with_retry(self.name(), retry, || async {
            let response = self.execute(provider, &user_msg).await?;
            let persona = Self::parse_persona(&response.content)?;
            Ok((persona, response))
        })
        .await
    }

    fn parse_persona(content: &str) -> Result<Persona, AgentError> {
        let persona: Persona = parse_json(content, "persona")?;
        if persona.role_prompt.trim().is_empty() {
            return Err(AgentError::ResponseParse {
                message: "persona has an empty role prompt".to_string(),
                content: content.to_string(),
            });
        }
        Ok(persona)
    }
}

#[async_trait]
impl Agent for PersonaAgent {
    fn name(&self) -> &'static str {
        "persona"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_persona() {
        let json = r#"```json
{"server": "Finance Agent", "agent_role_prompt": "You are a finance analyst."}
```"#;
        let persona = PersonaAgent::parse_persona(json).unwrap_or_default();
        assert_eq!(persona.server, "Finance Agent");
        assert_eq!(persona.role_prompt, "You are a finance analyst.");
    }

    #[test]
    fn test_parse_persona_rejects_blank_role() {
        let json = r#"{"server": "Finance Agent", "agent_role_prompt": "  "}"#;
        assert!(PersonaAgent::parse_persona(json).is_err());
        assert!(PersonaAgent::parse_persona("not json").is_err());
    }

    #[test]
    fn test_default_persona() {
        let persona = Persona::default();
        assert_eq!(persona.server, DEFAULT_SERVER);
        assert!(persona.role_prompt.contains("research assistant"));
    }
}
