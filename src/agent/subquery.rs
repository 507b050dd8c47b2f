//! Sub-query generation agent.

use async_trait::async_trait;
use serde::Deserialize;

use super::config::AgentConfig;
use super::prompt::build_sub_queries_prompt;
use super::provider::LlmProvider;
use super::traits::{Agent, AgentResponse, parse_json, run_with_retry};
use crate::error::AgentError;
use crate::retry::RetryPolicy;

#[derive(Deserialize)]
#[serde(untagged)]
enum QueriesPayload {
    Wrapped { queries: Vec<String> },
    Bare(Vec<String>),
}

/// Agent that decomposes a research question into search queries.
pub struct SubQueryAgent {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl SubQueryAgent {
    /// Creates the agent on the fast model.
    #[must_use]
    pub fn new(config: &AgentConfig, system_prompt: String) -> Self {
        Self {
            model: config.fast_model.clone(),
            max_tokens: config.fast_max_tokens,
            system_prompt,
        }
    }

    /// Generates at most `max_queries` distinct, non-empty sub-queries.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] once retries are exhausted, including when the
    /// model returns no usable query.
    pub async fn generate(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        max_queries: usize,
        date: &str,
        retry: &RetryPolicy,
    ) -> Result<(Vec<String>, AgentResponse), AgentError> {
        let user_msg = build_sub_queries_prompt(query, max_queries, date, None);
        run_with_retry(self.name(), retry, || async {
            let response = self.execute(provider, &user_msg).await?;
            let queries = Self::parse_queries(&response.content, max_queries)?;
            Ok((queries, response))
        })
        .await
    }

    fn parse_queries(content: &str, max_queries: usize) -> Result<Vec<String>, AgentError> {
        let raw = match parse_json::<QueriesPayload>(content, "sub-queries")? {
            QueriesPayload::Wrapped { queries } | QueriesPayload::Bare(queries) => queries,
        };
        let mut queries: Vec<String> = Vec::with_capacity(max_queries);
        for q in raw {
            let q = q.trim();
            if !q.is_empty() && !queries.iter().any(|seen| seen.eq_ignore_ascii_case(q)) {
                queries.push(q.to_string());
            }
        }
        queries.truncate(max_queries);
        if queries.is_empty() {
            return Err(AgentError::ResponseParse {
                message: "no sub-queries in response".to_string(),
                content: content.to_string(),
            });
        }
        Ok(queries)
    }
}

#[async_trait]
impl Agent for SubQueryAgent {
    fn name(&self) -> &'static str {
        "sub_queries"
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
    fn test_parse_wrapped_queries() {
        let json = r#"{"queries": ["ai chips 2026", "AI chips 2026", " ", "agentic ai adoption"]}"#;
        let queries = SubQueryAgent::parse_queries(json, 5).unwrap_or_default();
        assert_eq!(queries, vec!["ai chips 2026", "agentic ai adoption"]);
    }

    #[test]
    fn test_parse_bare_array_truncates() {
        let json = r#"["a", "b", "c", "d"]"#;
        let queries = SubQueryAgent::parse_queries(json, 3).unwrap_or_default();
        assert_eq!(queries.len(), 3);
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(SubQueryAgent::parse_queries(r#"{"queries": []}"#, 3).is_err());
        assert!(SubQueryAgent::parse_queries("search for things", 3).is_err());
    }
}
