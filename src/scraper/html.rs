//! Generic HTML scraper.

use async_trait::async_trait;
use reqwest::Client;
use ::scraper::{ElementRef, Html, Selector};

use super::pdf::{PdfScraper, is_pdf};
use super::{ScrapedPage, Scraper};
use crate::retriever::http::get_text;
use crate::retry::RetryPolicy;

/// Registry identifier.
pub const NAME: &str = "html";

const TEXT_BLOCKS: &str = "h1, h2, h3, h4, h5, h6, p, li, pre, blockquote, td";
const SKIPPED_ANCESTORS: &[&str] = &["nav", "footer", "header", "aside", "script", "style", "noscript", "form"];
const NON_TEXT: &[&str] = &["script", "style", "noscript", "template"];
const MAX_IMAGES: usize = 10;

/// Extracts the title and text blocks of an HTML page. PDF bodies served
/// from extension-less URLs go to the PDF scraper.
#[derive(Debug, Clone)]
pub struct HtmlScraper {
    client: Client,
    retry: RetryPolicy,
    pdf: PdfScraper,
}

impl HtmlScraper {
    /// Creates the scraper over a shared client.
    #[must_use]
    pub fn new(client: Client, retry: RetryPolicy) -> Self {
        Self {
            pdf: PdfScraper::new(client.clone(), retry),
            client,
            retry,
        }
    }
}

fn in_boilerplate(element: &ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| SKIPPED_ANCESTORS.contains(&a.value().name()))
}

/// Parses `html` into a page. `base` resolves relative image links.
pub(crate) fn extract(html: &str, base: Option<&url::Url>) -> ScrapedPage {
    let document = Html::parse_document(html);
    let (Ok(title_sel), Ok(block_sel), Ok(img_sel)) = (
        Selector::parse("title"),
        Selector::parse(TEXT_BLOCKS),
        Selector::parse("img[src]"),
    ) else {
        return ScrapedPage::default();
    };

    let title = document
        .select(&title_sel)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut blocks: Vec<String> = Vec::new();
    for element in document.select(&block_sel) {
        if in_boilerplate(&element) {
            continue;
        }
        // A list item holding paragraphs would otherwise be read twice.
        if element.value().name() == "li"
            && element
                .descendants()
                .filter_map(ElementRef::wrap)
                .any(|d| d.value().name() == "p")
        {
            continue;
        }
        let text = element.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    let image_urls = document
        .select(&img_sel)
        .filter_map(|img| img.value().attr("src"))
        .filter_map(|src| match base {
            Some(b) => b.join(src).ok().map(|u| u.to_string()),
            None => url::Url::parse(src).ok().map(|u| u.to_string()),
        })
        .filter(|u| u.starts_with("http"))
        .take(MAX_IMAGES)
        .collect();

    ScrapedPage {
        content: blocks.join("\n\n"),
        title,
        image_urls,
    }
}

/// All visible text of `html`, one line per text node, outside scripts and
/// styles. Used when block extraction misses text kept in bare containers.
pub(crate) fn document_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| NON_TEXT.contains(&a.value().name()));
            (!hidden).then(|| text.split_whitespace().collect::<Vec<_>>().join(" "))
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Scraper for HtmlScraper {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handles(&self, _url: &str) -> bool {
        true
    }

    async fn scrape(&self, url: &str) -> ScrapedPage {
        let (body, content_type) = match get_text(&self.client, &self.retry, url).await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::debug!(url, error = %e, "fetch failed");
                return ScrapedPage::default();
            }
        };
        if is_pdf(content_type.as_deref(), body.as_bytes()) {
            tracing::debug!(url, "PDF body, handing to the pdf scraper");
            return self.pdf.scrape(url).await;
        }
        let base = url::Url::parse(url).ok();
        extract(&body, base.as_ref())
    }
}
