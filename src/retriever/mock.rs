//! Canned results, for tests and offline runs.

use async_trait::async_trait;

use super::Retriever;
use crate::core::RetrievalResult;

/// Registry identifier.
pub const NAME: &str = "mock";

/// Returns a fixed result list.
#[derive(Debug, Clone)]
pub struct MockRetriever {
    results: Vec<RetrievalResult>,
    requires_scraping: bool,
}

impl MockRetriever {
    /// Links that still have to be scraped.
    #[must_use]
    pub const fn new(results: Vec<RetrievalResult>) -> Self {
        Self {
            results,
            requires_scraping: true,
        }
    }

    /// Ready content.
    #[must_use]
    pub const fn direct(results: Vec<RetrievalResult>) -> Self {
        Self {
            results,
            requires_scraping: false,
        }
    }

    /// `count` direct-content sources under `https://<host>/<n>`.
    #[must_use]
    pub fn generated(host: &str, count: usize) -> Self {
        let results = (0..count)
            .map(|n| RetrievalResult::DirectContent {
                source: format!("https://{host}/{n}"),
                raw_content: format!("Generated source {n} from {host}. It reports a study with data."),
                title: format!("{host} #{n}"),
                image_urls: Vec::new(),
            })
            .collect();
        Self::direct(results)
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &'static str {
        NAME
    }

    fn requires_scraping(&self) -> bool {
        self.requires_scraping
    }

    async fn search(&self, max_results: usize) -> Vec<RetrievalResult> {
        self.results.iter().take(max_results).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_respects_cap() {
        let mock = MockRetriever::generated("example.com", 7);
        assert!(!mock.requires_scraping());
        assert_eq!(mock.search(5).await.len(), 5);
        assert_eq!(mock.search(50).await.len(), 7);
        assert_eq!(mock.search(1).await[0].url(), "https://example.com/0");
    }
}
