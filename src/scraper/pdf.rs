//! PDF documents, extracted page by page.

use async_trait::async_trait;
use lopdf::{Document, Object};
use reqwest::Client;

use super::{ScrapedPage, Scraper, url_extension};
use crate::retriever::http::get_bytes;
use crate::retry::RetryPolicy;

/// Registry identifier.
pub const NAME: &str = "pdf";

const MAGIC: &[u8] = b"%PDF";

/// Fetches a PDF and extracts its text.
#[derive(Debug, Clone)]
pub struct PdfScraper {
    client: Client,
    retry: RetryPolicy,
}

impl PdfScraper {
    /// Creates the scraper over a shared client.
    #[must_use]
    pub const fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

/// Whether a response is a PDF, by content type or leading bytes.
pub(crate) fn is_pdf(content_type: Option<&str>, body: &[u8]) -> bool {
    content_type.is_some_and(|c| c.contains("application/pdf")) || body.starts_with(MAGIC)
}

fn info_title(document: &Document) -> Option<String> {
    let info = match document.trailer.get(b"Info").ok()? {
        Object::Reference(id) => document.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    match info.get(b"Title").ok()? {
        Object::String(bytes, _) => {
            let title = String::from_utf8_lossy(bytes).trim().to_string();
            (!title.is_empty()).then_some(title)
        }
        _ => None,
    }
}

/// Extracts the text of every page in order. Unreadable documents come back
/// empty.
pub(crate) fn extract(bytes: &[u8]) -> ScrapedPage {
    let document = match Document::load_mem(bytes) {
        Ok(document) => document,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable PDF");
            return ScrapedPage::default();
        }
    };
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut lines = Vec::new();
    for page in pages {
        match document.extract_text(&[page]) {
            Ok(text) => lines.extend(
                text.lines()
                    .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
                    .filter(|l| !l.is_empty()),
            ),
            Err(e) => tracing::debug!(page, error = %e, "page text not extractable"),
        }
    }
    ScrapedPage {
        content: lines.join("\n"),
        title: info_title(&document),
        image_urls: Vec::new(),
    }
}

#[async_trait]
impl Scraper for PdfScraper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, url: &str) -> bool {
        url_extension(url).is_some_and(|e| e == "pdf")
    }

    async fn scrape(&self, url: &str) -> ScrapedPage {
        let (body, content_type) = match get_bytes(&self.client, &self.retry, url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!(url, error = %e, "fetch failed");
                return ScrapedPage::default();
            }
        };
        if !is_pdf(content_type.as_deref(), &body) {
            tracing::debug!(url, content_type = ?content_type, "not a PDF body");
            return ScrapedPage::default();
        }
        extract(&body)
    }
}
