//! arXiv paper pages: resolved to the abstract through the API instead of
//! fetching the PDF.

use async_trait::async_trait;
use reqwest::Client;

use super::{ScrapedPage, Scraper};
use crate::retriever::arxiv::{ENDPOINT, parse_atom_feed};
use crate::retriever::http::send_with_retry;
use crate::retry::RetryPolicy;

/// Registry identifier.
pub const NAME: &str = "arxiv";

/// Scrapes `arxiv.org/abs/<id>` and `arxiv.org/pdf/<id>` links.
#[derive(Debug, Clone)]
pub struct ArxivScraper {
    client: Client,
    retry: RetryPolicy,
}

impl ArxivScraper {
    /// Creates the scraper over a shared client.
    #[must_use]
    pub const fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

/// Paper identifier from an abstract or PDF link.
pub(crate) fn paper_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.").trim_start_matches("export.");
    if host != "arxiv.org" {
        return None;
    }
    let path = parsed.path();
    let rest = path.strip_prefix("/abs/").or_else(|| path.strip_prefix("/pdf/"))?;
    let id = rest.trim_end_matches('/').trim_end_matches(".pdf");
    (!id.is_empty()).then(|| id.to_string())
}

#[async_trait]
impl Scraper for ArxivScraper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, url: &str) -> bool {
        paper_id(url).is_some()
    }

    async fn scrape(&self, url: &str) -> ScrapedPage {
        let Some(id) = paper_id(url) else {
            return ScrapedPage::default();
        };
        let params = [("id_list", id.as_str())];
        let body = match send_with_retry(&self.retry, NAME, || self.client.get(ENDPOINT).query(&params)).await {
            Ok(response) => response.text().await.unwrap_or_default(),
            Err(e) => {
                tracing::debug!(url, error = %e, "abstract lookup failed");
                return ScrapedPage::default();
            }
        };
        parse_atom_feed(&body)
            .into_iter()
            .next()
            .map_or_else(ScrapedPage::default, |entry| ScrapedPage {
                content: entry.summary,
                title: Some(entry.title).filter(|t| !t.is_empty()),
                image_urls: Vec::new(),
            })
    }
}
