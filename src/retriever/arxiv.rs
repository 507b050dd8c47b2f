//! arXiv Atom API. Returns paper abstracts directly.

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;

use super::http::{build_client, send_with_retry};
use super::{Retriever, RetrieverOptions};
use crate::core::RetrievalResult;
use crate::error::RetrieverError;
use crate::retry::RetryPolicy;

/// Registry identifier.
pub const NAME: &str = "arxiv";

pub(crate) const ENDPOINT: &str = "https://export.arxiv.org/api/query";

/// One `<entry>` of an arXiv Atom feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AtomEntry {
    /// Bare identifier, version suffix stripped (`2501.01234`).
    pub id: String,
    pub title: String,
    pub summary: String,
    pub authors: Vec<String>,
    /// `alternate` link, usually the abstract page.
    pub html_url: Option<String>,
}

impl AtomEntry {
    pub(crate) fn abs_url(&self) -> String {
        self.html_url
            .clone()
            .unwrap_or_else(|| format!("https://arxiv.org/abs/{}", self.id))
    }
}

/// Collapses runs of whitespace; arXiv wraps titles and abstracts.
fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn bare_id(raw: &str) -> String {
    let tail = raw.rsplit("/abs/").next().unwrap_or(raw).trim();
    let tail = tail.strip_prefix("arXiv:").unwrap_or(tail);
    match tail.rfind('v') {
        Some(ix) if ix > 0 && tail[ix + 1..].chars().all(|c| c.is_ascii_digit()) && ix + 1 < tail.len() => {
            tail[..ix].to_string()
        }
        _ => tail.to_string(),
    }
}

/// Parses an arXiv Atom feed. Malformed XML yields the entries read so far.
pub(crate) fn parse_atom_feed(xml: &str) -> Vec<AtomEntry> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut target: Option<&'static str> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"entry" => current = Some(AtomEntry::default()),
                b"id" if current.is_some() => target = Some("id"),
                b"title" if current.is_some() => target = Some("title"),
                b"summary" if current.is_some() => target = Some("summary"),
                b"name" if current.is_some() => target = Some("name"),
                _ => target = None,
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"link" => {
                let Some(entry) = current.as_mut() else {
                    continue;
                };
                let mut rel = None;
                let mut href = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"rel" => rel = Some(value),
                        b"href" => href = Some(value),
                        _ => {}
                    }
                }
                if rel.as_deref() == Some("alternate") && entry.html_url.is_none() {
                    entry.html_url = href;
                }
            }
            Ok(Event::Text(t)) => {
                let (Some(field), Some(entry)) = (target.take(), current.as_mut()) else {
                    continue;
                };
                let text = t.unescape().map(|c| squash(&c)).unwrap_or_default();
                match field {
                    "id" => entry.id = bare_id(&text),
                    "title" => entry.title = text,
                    "summary" => entry.summary = text,
                    "name" => entry.authors.push(text),
                    _ => {}
                }
            }
            Ok(Event::End(e)) => {
                target = None;
                if e.local_name().as_ref() == b"entry" {
                    if let Some(entry) = current.take() {
                        out.push(entry);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, parsed = out.len(), "malformed arXiv feed");
                break;
            }
            _ => {}
        }
    }
    out
}

/// Builds `all:tok AND all:tok` from the query words.
fn search_query(query: &str) -> String {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(|t| format!("all:{t}"))
        .collect();
    if tokens.is_empty() {
        "all:*".to_string()
    } else {
        tokens.join(" AND ")
    }
}

/// Academic search over arXiv abstracts.
#[derive(Debug)]
pub struct ArxivRetriever {
    query: String,
    client: Client,
    retry: RetryPolicy,
}

impl ArxivRetriever {
    /// Creates the retriever.
    ///
    /// # Errors
    ///
    /// Returns [`RetrieverError::Http`] if the HTTP client cannot be built.
    pub fn new(query: &str, options: &RetrieverOptions) -> Result<Self, RetrieverError> {
        Ok(Self {
            query: query.to_string(),
            client: build_client(options.timeout)?,
            retry: options.retry,
        })
    }

    fn into_results(entries: Vec<AtomEntry>, max_results: usize) -> Vec<RetrievalResult> {
        entries
            .into_iter()
            .filter(|e| !e.summary.is_empty())
            .take(max_results)
            .map(|e| {
                let mut content = e.summary.clone();
                if !e.authors.is_empty() {
                    content = format!("Authors: {}\n\n{content}", e.authors.join(", "));
                }
                RetrievalResult::DirectContent {
                    source: e.abs_url(),
                    raw_content: content,
                    title: e.title,
                    image_urls: Vec::new(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl Retriever for ArxivRetriever {
    fn name(&self) -> &'static str {
        NAME
    }

    fn requires_scraping(&self) -> bool {
        false
    }

    async fn search(&self, max_results: usize) -> Vec<RetrievalResult> {
        let search = search_query(&self.query);
        let max = max_results.to_string();
        let params = [
            ("search_query", search.as_str()),
            ("start", "0"),
            ("max_results", max.as_str()),
        ];
        let response = match send_with_retry(&self.retry, NAME, || self.client.get(ENDPOINT).query(&params)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(retriever = NAME, query = %self.query, error = %e, "search failed");
                return Vec::new();
            }
        };
        match response.text().await {
            Ok(body) => Self::into_results(parse_atom_feed(&body), max_results),
            Err(e) => {
                tracing::warn!(retriever = NAME, error = %e, "unreadable feed");
                Vec::new()
            }
        }
    }
}
