//! Caller-supplied URLs.

use async_trait::async_trait;

use super::{Retriever, RetrieverOptions};
use crate::core::RetrievalResult;
use crate::error::RetrieverError;

/// Registry identifier.
pub const NAME: &str = "static";

/// Returns the configured `source_urls` as links to scrape, ignoring the query.
#[derive(Debug)]
pub struct StaticUrlRetriever {
    urls: Vec<String>,
}

impl StaticUrlRetriever {
    /// Creates the retriever.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::Misconfigured`] when no usable URL is set.
    pub fn new(_query: &str, options: &RetrieverOptions) -> Result<Self, RetrieverError> {
        let mut urls: Vec<String> = Vec::new();
        for raw in &options.source_urls {
            let trimmed = raw.trim();
            if trimmed.is_empty() || urls.iter().any(|u| u == trimmed) {
                continue;
            }
            if url::Url::parse(trimmed).is_err() {
                tracing::warn!(retriever = NAME, url = trimmed, "ignoring unparseable source url");
                continue;
            }
            urls.push(trimmed.to_string());
        }
        if urls.is_empty() {
            return Err(RetrieverError::Misconfigured {
                retriever: NAME.to_string(),
                message: "source_urls is empty".to_string(),
            });
        }
        Ok(Self { urls })
    }
}

#[async_trait]
impl Retriever for StaticUrlRetriever {
    fn name(&self) -> &'static str {
        NAME
    }

    fn requires_scraping(&self) -> bool {
        true
    }

    async fn search(&self, max_results: usize) -> Vec<RetrievalResult> {
        self.urls
            .iter()
            .take(max_results)
            .map(|u| RetrievalResult::NeedsScrape {
                href: u.clone(),
                title: None,
                body: String::new(),
            })
            .collect()
    }
}
