//! Scraper adapters: turn a URL into extracted text.
//!
//! Scrapers never fail. A fetch error, an unsupported body or an empty page
//! all come back as an empty [`ScrapedPage`], and the caller decides what
//! counts as too short. The registry picks a scraper by URL pattern, with
//! the HTML scraper as the catch-all, and retries with the plain-text
//! scraper when HTML extraction comes back thin. PDFs get their own
//! scraper, picked by extension or by the content type of the response.

pub mod arxiv;
pub mod html;
pub mod pdf;
pub mod text;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrieverError;
use crate::retriever::http::build_client;
use crate::retry::RetryPolicy;

pub use arxiv::ArxivScraper;
pub use html::HtmlScraper;
pub use pdf::PdfScraper;
pub use text::TextScraper;

/// Extracted page content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedPage {
    /// Visible text.
    pub content: String,
    /// Page title, when one was found.
    pub title: Option<String>,
    /// Absolute image URLs.
    #[serde(default)]
    pub image_urls: Vec<String>,
}

impl ScrapedPage {
    /// Character length of the extracted text.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    /// Whether nothing was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Turns a URL into text.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Registry identifier.
    fn name(&self) -> &'static str;

    /// Whether this scraper should be picked for `url`.
    fn handles(&self, url: &str) -> bool;

    /// Fetches and extracts `url`. Empty on any failure.
    async fn scrape(&self, url: &str) -> ScrapedPage;
}

/// Ordered scraper list; the first scraper that handles a URL wins.
#[derive(Clone)]
pub struct ScraperRegistry {
    scrapers: Vec<Arc<dyn Scraper>>,
    default: Arc<dyn Scraper>,
    fallback: Option<Arc<dyn Scraper>>,
}

impl ScraperRegistry {
    /// The built-in scrapers sharing one HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::Http`] if the client cannot be built.
    pub fn with_defaults(timeout: Duration, retry: RetryPolicy) -> Result<Self, RetrieverError> {
        let client = build_client(timeout)?;
        let text: Arc<dyn Scraper> = Arc::new(TextScraper::new(client.clone(), retry));
        Ok(Self {
            scrapers: vec![
                Arc::new(ArxivScraper::new(client.clone(), retry)),
                Arc::new(PdfScraper::new(client.clone(), retry)),
                Arc::clone(&text),
            ],
            default: Arc::new(HtmlScraper::new(client, retry)),
            fallback: Some(text),
        })
    }

    /// A registry that sends every URL to `scraper`, with no fallback.
    #[must_use]
    pub fn single(scraper: Arc<dyn Scraper>) -> Self {
        Self {
            scrapers: Vec::new(),
            default: scraper,
            fallback: None,
        }
    }

    /// Registered names.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.scrapers.iter().map(|s| s.name()).collect();
        names.push(self.default.name());
        names.sort_unstable();
        names.dedup();
        names
    }

    /// The scraper for `url`.
    #[must_use]
    pub fn select(&self, url: &str) -> Arc<dyn Scraper> {
        self.scrapers
            .iter()
            .find(|s| s.handles(url))
            .map_or_else(|| Arc::clone(&self.default), Arc::clone)
    }

    /// Looks a scraper up by name.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::UnknownScraper`] for unregistered names.
    pub fn by_name(&self, name: &str) -> Result<Arc<dyn Scraper>, RetrieverError> {
        let needle = name.trim().to_lowercase();
        self.scrapers
            .iter()
            .chain(std::iter::once(&self.default))
            .find(|s| s.name() == needle)
            .map(Arc::clone)
            .ok_or_else(|| RetrieverError::UnknownScraper {
                name: name.to_string(),
                supported: self.names().join(", "),
            })
    }

    /// Scrapes `url` with `forced` or the selected scraper. When the result
    /// is shorter than `min_length`, the fallback scraper gets one try and
    /// the longer of the two pages wins.
    pub async fn scrape(&self, url: &str, forced: Option<&Arc<dyn Scraper>>, min_length: usize) -> ScrapedPage {
        let primary = forced.map_or_else(|| self.select(url), Arc::clone);
        let page = primary.scrape(url).await;
        if page.len() >= min_length {
            return page;
        }
        let Some(fallback) = self.fallback.as_ref().filter(|f| f.name() != primary.name()) else {
            return page;
        };
        tracing::debug!(
            url,
            scraper = primary.name(),
            fallback = fallback.name(),
            length = page.len(),
            "content too short, trying fallback scraper"
        );
        let retry = fallback.scrape(url).await;
        if retry.len() > page.len() {
            ScrapedPage {
                title: retry.title.or(page.title),
                ..retry
            }
        } else {
            page
        }
    }
}

impl std::fmt::Debug for ScraperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Path extension of a URL, lowercased.
pub(crate) fn url_extension(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?.to_string();
    let (_, ext) = segment.rsplit_once('.')?;
    Some(ext.to_lowercase())
}


#[cfg(test)]
mod tests {
    use super::testing::StubScraper;
    use super::*;
    use std::collections::HashMap;

    fn registry() -> ScraperRegistry {
        ScraperRegistry::with_defaults(Duration::from_secs(5), RetryPolicy::immediate(1))
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_select_by_pattern() {
        let r = registry();
        assert_eq!(r.select("https://arxiv.org/abs/2501.01234").name(), "arxiv");
        assert_eq!(r.select("https://arxiv.org/pdf/2501.01234v2").name(), "arxiv");
        assert_eq!(r.select("https://example.com/notes.md").name(), "text");
        assert_eq!(r.select("https://example.com/papers/Report.PDF").name(), "pdf");
        assert_eq!(r.select("https://example.com/post").name(), "html");
    }

    #[test]
    fn test_by_name_unknown_lists_supported() {
        let r = registry();
        assert!(r.by_name("HTML").is_ok());
        let Err(err) = r.by_name("browser") else {
            unreachable!()
        };
        assert!(err.to_string().contains("arxiv, html, pdf, text"));
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://a.com/x/data.CSV?x=1").as_deref(), Some("csv"));
        assert_eq!(url_extension("https://a.com/x/"), None);
        assert_eq!(url_extension("nonsense"), None);
    }

    #[tokio::test]
    async fn test_fallback_used_when_short() {
        let mut thin = HashMap::new();
        thin.insert("https://a.com".to_string(), "tiny".to_string());
        let mut full = HashMap::new();
        full.insert("https://a.com".to_string(), "a much longer body of text".to_string());
        let registry = ScraperRegistry {
            scrapers: Vec::new(),
            default: Arc::new(StubScraper { name: "html", pages: thin }),
            fallback: Some(Arc::new(StubScraper { name: "text", pages: full })),
        };
        let page = registry.scrape("https://a.com", None, 10).await;
        assert_eq!(page.content, "a much longer body of text");
        let page = registry.scrape("https://a.com", None, 2).await;
        assert_eq!(page.content, "tiny");
    }
}
