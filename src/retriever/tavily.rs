//! Tavily search API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::http::{build_client, send_with_retry};
use super::{Retriever, RetrieverOptions};
use crate::core::RetrievalResult;
use crate::error::RetrieverError;
use crate::retry::RetryPolicy;

/// Registry identifier.
pub const NAME: &str = "tavily";
/// Credential variable.
pub const API_KEY_VAR: &str = "TAVILY_API_KEY";

const ENDPOINT: &str = "https://api.tavily.com/search";

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    topic: &'a str,
    max_results: usize,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    include_domains: &'a [String],
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: String,
}

/// Web search through Tavily. Returns links to scrape.
#[derive(Debug)]
pub struct TavilyRetriever {
    query: String,
    api_key: String,
    domains: Vec<String>,
    client: Client,
    retry: RetryPolicy,
}

impl TavilyRetriever {
    /// Creates the retriever.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::MissingCredential`] when no API key is set.
    pub fn new(query: &str, options: &RetrieverOptions) -> Result<Self, RetrieverError> {
        let api_key = options
            .credential(API_KEY_VAR)
            .ok_or_else(|| RetrieverError::MissingCredential {
                retriever: NAME.to_string(),
                variable: API_KEY_VAR.to_string(),
            })?;
        Ok(Self {
            query: query.to_string(),
            api_key,
            domains: options.query_domains.clone(),
            client: build_client(options.timeout)?,
            retry: options.retry,
        })
    }

    fn into_results(response: SearchResponse, max_results: usize) -> Vec<RetrievalResult> {
        response
            .results
            .into_iter()
            .take(max_results)
            .map(|hit| RetrievalResult::NeedsScrape {
                href: hit.url,
                title: hit.title,
                body: hit.content,
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for TavilyRetriever {
    fn name(&self) -> &'static str {
        NAME
    }

    fn requires_scraping(&self) -> bool {
        true
    }

    async fn search(&self, max_results: usize) -> Vec<RetrievalResult> {
        let body = SearchRequest {
            api_key: &self.api_key,
            query: &self.query,
            search_depth: "basic",
            topic: "general",
            max_results,
            include_domains: &self.domains,
        };
        let response = match send_with_retry(&self.retry, NAME, || self.client.post(ENDPOINT).json(&body)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(retriever = NAME, query = %self.query, error = %e, "search failed");
                return Vec::new();
            }
        };
        match response.json::<SearchResponse>().await {
            Ok(parsed) => Self::into_results(parsed, max_results),
            Err(e) => {
                tracing::warn!(retriever = NAME, error = %e, "unreadable search response");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_fails_at_construction() {
        let mut options = RetrieverOptions::default();
        options.headers.insert("tavily_api_key".to_string(), String::new());
        // Only a blank key in the map; the environment may still hold one.
        if std::env::var(API_KEY_VAR).is_err() {
            let err = TavilyRetriever::new("q", &options);
            assert!(matches!(err, Err(RetrieverError::MissingCredential { .. })));
        }
    }

    #[test]
    fn test_key_from_option_map() {
        let mut options = RetrieverOptions::default();
        options.headers.insert("tavily_api_key".to_string(), "tvly-123".to_string());
        let r = TavilyRetriever::new("q", &options).unwrap_or_else(|_| unreachable!());
        assert!(r.requires_scraping());
        assert_eq!(r.name(), "tavily");
    }

    #[test]
    fn test_response_mapping_caps_results() {
        let json = r#"{"results": [
            {"url": "https://a.com", "title": "A", "content": "alpha"},
            {"url": "https://b.com", "content": "beta"},
            {"url": "https://c.com"}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap_or_else(|_| unreachable!());
        let results = TavilyRetriever::into_results(parsed, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url(), "https://a.com");
        assert!(matches!(&results[1], RetrievalResult::NeedsScrape { title: None, .. }));
    }
}
