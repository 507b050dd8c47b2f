//! `DuckDuckGo` instant-answer API. Needs no key.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::http::{build_client, send_with_retry};
use super::{Retriever, RetrieverOptions};
use crate::core::RetrievalResult;
use crate::error::RetrieverError;
use crate::retry::RetryPolicy;

/// Registry identifier.
pub const NAME: &str = "duckduckgo";

const ENDPOINT: &str = "https://api.duckduckgo.com/";

/// Web search through `DuckDuckGo`. Returns links to scrape.
#[derive(Debug)]
pub struct DuckDuckGoRetriever {
    query: String,
    client: Client,
    retry: RetryPolicy,
}

impl DuckDuckGoRetriever {
    /// Creates the retriever. `query_domains` become `site:` filters.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::Http`] if the HTTP client cannot be built.
    pub fn new(query: &str, options: &RetrieverOptions) -> Result<Self, RetrieverError> {
        Ok(Self {
            query: scoped_query(query, &options.query_domains),
            client: build_client(options.timeout)?,
            retry: options.retry,
        })
    }

    fn parse(body: &Value, max_results: usize) -> Vec<RetrievalResult> {
        let mut out = Vec::new();

        let abstract_url = body.get("AbstractURL").and_then(Value::as_str).unwrap_or("");
        if !abstract_url.is_empty() {
            out.push(RetrievalResult::NeedsScrape {
                href: abstract_url.to_string(),
                title: body.get("Heading").and_then(Value::as_str).map(str::to_string),
                body: body
                    .get("AbstractText")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            });
        }

        let mut push_topic = |topic: &Value, out: &mut Vec<RetrievalResult>| {
            let Some(url) = topic.get("FirstURL").and_then(Value::as_str) else {
                return;
            };
            let text = topic.get("Text").and_then(Value::as_str).unwrap_or("");
            out.push(RetrievalResult::NeedsScrape {
                href: url.to_string(),
                title: text.split(" - ").next().map(str::to_string),
                body: text.to_string(),
            });
        };

        for key in ["Results", "RelatedTopics"] {
            for topic in body.get(key).and_then(Value::as_array).into_iter().flatten() {
                // Grouped topics nest their entries one level down.
                if let Some(group) = topic.get("Topics").and_then(Value::as_array) {
                    for inner in group {
                        push_topic(inner, &mut out);
                    }
                } else {
                    push_topic(topic, &mut out);
                }
            }
        }

        out.truncate(max_results);
        out
    }
}

fn scoped_query(query: &str, domains: &[String]) -> String {
    if domains.is_empty() {
        return query.to_string();
    }
    let sites: Vec<String> = domains.iter().map(|d| format!("site:{d}")).collect();
    format!("{query} {}", sites.join(" OR "))
}

#[async_trait]
impl Retriever for DuckDuckGoRetriever {
    fn name(&self) -> &'static str {
        NAME
    }

    fn requires_scraping(&self) -> bool {
        true
    }

    async fn search(&self, max_results: usize) -> Vec<RetrievalResult> {
        let params = [
            ("q", self.query.as_str()),
            ("format", "json"),
            ("no_html", "1"),
            ("skip_disambig", "1"),
        ];
        let response = match send_with_retry(&self.retry, NAME, || self.client.get(ENDPOINT).query(&params)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(retriever = NAME, query = %self.query, error = %e, "search failed");
                return Vec::new();
            }
        };
        match response.json::<Value>().await {
            Ok(body) => Self::parse(&body, max_results),
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
    use serde_json::json;

    #[test]
    fn test_scoped_query() {
        assert_eq!(scoped_query("rust", &[]), "rust");
        assert_eq!(
            scoped_query("rust", &["a.com".to_string(), "b.org".to_string()]),
            "rust site:a.com OR site:b.org"
        );
    }

    #[test]
    fn test_parse_flattens_topic_groups() {
        let body = json!({
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust",
            "AbstractText": "Rust is a language.",
            "Heading": "Rust",
            "RelatedTopics": [
                {"FirstURL": "https://a.com", "Text": "A - first"},
                {"Name": "Group", "Topics": [
                    {"FirstURL": "https://b.com", "Text": "B - second"}
                ]}
            ]
        });
        let results = DuckDuckGoRetriever::parse(&body, 10);
        let urls: Vec<&str> = results.iter().map(RetrievalResult::url).collect();
        assert_eq!(urls, vec!["https://en.wikipedia.org/wiki/Rust", "https://a.com", "https://b.com"]);
    }

    #[test]
    fn test_parse_caps_and_handles_empty() {
        assert!(DuckDuckGoRetriever::parse(&json!({}), 5).is_empty());
        let body = json!({"Results": [
            {"FirstURL": "https://a.com", "Text": "a"},
            {"FirstURL": "https://b.com", "Text": "b"}
        ]});
        assert_eq!(DuckDuckGoRetriever::parse(&body, 1).len(), 1);
    }
}
