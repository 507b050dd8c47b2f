//! Plain-text scraper: raw bodies, or the full visible text of HTML.

use async_trait::async_trait;
use reqwest::Client;

use super::html::{document_text, extract};
use super::{ScrapedPage, Scraper, url_extension};
use crate::retriever::http::get_text;
use crate::retry::RetryPolicy;

/// Registry identifier.
pub const NAME: &str = "text";

const EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv", "json", "xml", "rst"];

/// Fetches a URL as text.
#[derive(Debug, Clone)]
pub struct TextScraper {
    client: Client,
    retry: RetryPolicy,
}

impl TextScraper {
    /// Creates the scraper over a shared client.
    #[must_use]
    pub const fn new(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

fn looks_like_html(content_type: &str, body: &str) -> bool {
    content_type.contains("html") || body.trim_start().starts_with('<')
}

/// Reads an HTML body through the parser. Block extraction supplies the
/// title and images; the text is whichever of block text and full document
/// text is longer.
pub(crate) fn html_page(body: &str, base: Option<&url::Url>) -> ScrapedPage {
    let mut page = extract(body, base);
    let full = document_text(body);
    if full.chars().count() > page.len() {
        page.content = full;
    }
    page
}

#[async_trait]
impl Scraper for TextScraper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, url: &str) -> bool {
        url_extension(url).is_some_and(|e| EXTENSIONS.contains(&e.as_str()))
    }

    async fn scrape(&self, url: &str) -> ScrapedPage {
        let (body, content_type) = match get_text(&self.client, &self.retry, url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!(url, error = %e, "fetch failed");
                return ScrapedPage::default();
            }
        };
        let content_type = content_type.unwrap_or_default();
        if content_type.contains("pdf") || content_type.starts_with("image/") {
            return ScrapedPage::default();
        }
        if looks_like_html(&content_type, &body) {
            let base = url::Url::parse(url).ok();
            return html_page(&body, base.as_ref());
        }
        ScrapedPage {
            content: body.trim().to_string(),
            title: None,
            image_urls: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_page_decodes_entities() {
        let html = "<html><head><title>T &amp; C</title><style>p{}</style></head>\
                    <body><div>Caf&eacute; &#8217;24 &#x27;notes&#x27;</div>\
                    <a title=\"x > y\">Second   line</a><script>alert(1)</script></body></html>";
        let page = html_page(html, None);
        assert_eq!(page.title.as_deref(), Some("T & C"));
        assert!(page.content.contains("Caf\u{e9} \u{2019}24 'notes'"));
        assert!(page.content.contains("Second line"));
        assert!(!page.content.contains("alert"));
        assert!(!page.content.contains('>'));
    }

    #[test]
    fn test_html_page_prefers_longer_text() {
        let html = "<body><p>Short.</p><div>A much longer passage kept in a bare container.</div></body>";
        let page = html_page(html, None);
        assert!(page.content.contains("bare container"));
        assert!(page.content.contains("Short."));
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("text/html; charset=utf-8", "anything"));
        assert!(looks_like_html("", "  <!doctype html>"));
        assert!(!looks_like_html("text/plain", "just text"));
    }
}
