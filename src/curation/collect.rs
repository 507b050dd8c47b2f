//! Collection: fan out to retrievers, dedup, scrape.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};

use super::dedup::{Claim, VisitedUrls, normalize_url};
use crate::core::{RetrievalResult, SourceRecord};
use crate::retriever::Retriever;
use crate::scraper::{Scraper, ScraperRegistry};

/// A source dropped during collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectFailure {
    /// URL of the dropped source.
    pub url: String,
    /// Why it was dropped.
    pub reason: String,
}

/// A result whose URL a lower-indexed sub-query holds. It is kept
/// unscraped until [`Collector::settle`] knows whether the holder finished.
#[derive(Debug)]
pub struct Deferred {
    /// Dispatch index holding the URL when the result arrived.
    pub holder: usize,
    pending: Pending,
}

impl Deferred {
    /// URL of the deferred result.
    #[must_use]
    pub fn url(&self) -> &str {
        self.pending.result.url()
    }
}

/// What one sub-query's collection produced.
#[derive(Debug, Default)]
pub struct Collected {
    /// New, usable sources in retriever order.
    pub sources: Vec<SourceRecord>,
    /// Sources dropped after a failed or too-short scrape.
    pub failures: Vec<CollectFailure>,
    /// Results skipped because their URL was already visited.
    pub duplicates: usize,
    /// Results returned by all retrievers before dedup.
    pub retrieved: usize,
    /// Results waiting on a lower-indexed sub-query's claim.
    pub deferred: Vec<Deferred>,
}

/// Runs retrievers and scrapes what they return.
#[derive(Clone)]
pub struct Collector {
    scrapers: ScraperRegistry,
    forced_scraper: Option<Arc<dyn Scraper>>,
    max_results: usize,
    scrape_concurrency: usize,
    min_content_length: usize,
}

#[derive(Debug)]
struct Pending {
    origin: &'static str,
    result: RetrievalResult,
}

impl Collector {
    /// Creates a collector.
    #[must_use]
    pub fn new(scrapers: ScraperRegistry, max_results: usize, scrape_concurrency: usize, min_content_length: usize) -> Self {
        Self {
            scrapers,
            forced_scraper: None,
            max_results,
            scrape_concurrency: scrape_concurrency.max(1),
            min_content_length,
        }
    }

    /// Sends every link to `scraper` instead of selecting by URL.
    #[must_use]
    pub fn with_forced_scraper(mut self, scraper: Arc<dyn Scraper>) -> Self {
        self.forced_scraper = Some(scraper);
        self
    }

    /// Searches all `retrievers` concurrently, claims each URL in `visited`
    /// for `sub_query_index`, then scrapes the claimed links with bounded
    /// parallelism.
    ///
    /// A URL another sub-query already holds is not scraped here. When the
    /// holder has a lower index the result is deferred to [`Self::settle`].
    ///
    /// Output order follows retriever order, then each retriever's result
    /// order, regardless of completion order.
    pub async fn collect(&self, sub_query_index: usize, retrievers: &[Box<dyn Retriever>], visited: &VisitedUrls) -> Collected {
        let searches = retrievers.iter().map(|r| async move {
            let results = r.search(self.max_results).await;
            tracing::debug!(retriever = r.name(), results = results.len(), "retriever returned");
            (r.name(), results)
        });
        let batches = join_all(searches).await;

        let mut collected = Collected::default();
        let mut seen_here = HashSet::new();
        let mut pending = Vec::new();
        for (origin, results) in batches {
            for result in results {
                collected.retrieved += 1;
                if result.url().trim().is_empty() {
                    continue;
                }
                if !seen_here.insert(normalize_url(result.url())) {
                    collected.duplicates += 1;
                    continue;
                }
                match visited.claim(result.url(), sub_query_index) {
                    Claim::Claimed => pending.push(Pending { origin, result }),
                    Claim::Held(holder) if holder < sub_query_index => collected.deferred.push(Deferred {
                        holder,
                        pending: Pending { origin, result },
                    }),
                    Claim::Held(_) => collected.duplicates += 1,
                }
            }
        }

        let (sources, failures) = self.materialize_all(sub_query_index, pending).await;
        collected.sources = sources;
        collected.failures = failures;
        tracing::debug!(
            sub_query_index,
            retrieved = collected.retrieved,
            duplicates = collected.duplicates,
            deferred = collected.deferred.len(),
            kept = collected.sources.len(),
            dropped = collected.failures.len(),
            "collection finished"
        );
        collected
    }

    /// Settles URL ownership for one finished sub-query after every
    /// iteration ended. Call it in dispatch order.
    ///
    /// Sources whose URL moved to a lower index become duplicates. Deferred
    /// results whose holder released its claim are scraped for
    /// `sub_query_index` under `limit`; the rest become duplicates.
    pub async fn settle(&self, collected: &mut Collected, sub_query_index: usize, visited: &VisitedUrls, limit: Duration) {
        let before = collected.sources.len();
        collected
            .sources
            .retain(|source| visited.confirm(&source.url, sub_query_index));
        collected.duplicates += before - collected.sources.len();

        let mut pending = Vec::new();
        for deferred in std::mem::take(&mut collected.deferred) {
            if visited.confirm(deferred.url(), sub_query_index) {
                tracing::debug!(
                    sub_query_index,
                    holder = deferred.holder,
                    url = deferred.url(),
                    "released URL taken over"
                );
                pending.push(deferred.pending);
            } else {
                collected.duplicates += 1;
            }
        }
        if pending.is_empty() {
            return;
        }

        let urls: Vec<String> = pending.iter().map(|p| p.result.url().to_string()).collect();
        match tokio::time::timeout(limit, self.materialize_all(sub_query_index, pending)).await {
            Ok((sources, failures)) => {
                collected.sources.extend(sources);
                collected.failures.extend(failures);
            }
            Err(_) => {
                tracing::warn!(sub_query_index, urls = urls.len(), "taken-over scrapes timed out");
                collected.failures.extend(urls.into_iter().map(|url| CollectFailure {
                    url,
                    reason: format!("timed out after {}s", limit.as_secs()),
                }));
            }
        }
    }

    async fn materialize_all(
        &self,
        sub_query_index: usize,
        pending: Vec<Pending>,
    ) -> (Vec<SourceRecord>, Vec<CollectFailure>) {
        let outcomes: Vec<Result<SourceRecord, CollectFailure>> = stream::iter(pending)
            .map(|p| self.materialize(p, sub_query_index))
            .buffered(self.scrape_concurrency)
            .collect()
            .await;
        let mut sources = Vec::new();
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(source) => sources.push(source),
                Err(failure) => failures.push(failure),
            }
        }
        (sources, failures)
    }

    async fn materialize(&self, pending: Pending, sub_query_index: usize) -> Result<SourceRecord, CollectFailure> {
        let mut source = match pending.result {
            RetrievalResult::DirectContent {
                source,
                raw_content,
                title,
                image_urls,
            } => {
                if raw_content.trim().is_empty() {
                    return Err(CollectFailure {
                        url: source,
                        reason: "empty content".to_string(),
                    });
                }
                let mut record = SourceRecord::new(source, title, raw_content, pending.origin);
                record.image_urls = image_urls;
                record
            }
            RetrievalResult::NeedsScrape { href, title, .. } => {
                let page = self
                    .scrapers
                    .scrape(&href, self.forced_scraper.as_ref(), self.min_content_length)
                    .await;
                if page.len() < self.min_content_length {
                    return Err(CollectFailure {
                        reason: format!(
                            "scraped content too short ({} < {} chars)",
                            page.len(),
                            self.min_content_length
                        ),
                        url: href,
                    });
                }
                let title = page.title.or(title).unwrap_or_else(|| href.clone());
                let mut record = SourceRecord::new(href, title, page.content, pending.origin);
                record.image_urls = page.image_urls;
                record
            }
        };
        source.sub_query_index = sub_query_index;
        Ok(source)
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("scrapers", &self.scrapers)
            .field("forced_scraper", &self.forced_scraper.as_ref().map(|s| s.name()))
            .field("max_results", &self.max_results)
            .field("scrape_concurrency", &self.scrape_concurrency)
            .field("min_content_length", &self.min_content_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::MockRetriever;
    use crate::scraper::testing::StubScraper;
    use std::collections::HashMap;

    fn link(url: &str) -> RetrievalResult {
        RetrievalResult::NeedsScrape {
            href: url.to_string(),
            title: Some("search title".to_string()),
            body: String::new(),
        }
    }

    fn collector(pages: &[(&str, &str)]) -> Collector {
        let pages: HashMap<String, String> = pages.iter().map(|(u, c)| ((*u).to_string(), (*c).to_string())).collect();
        let registry = ScraperRegistry::single(Arc::new(StubScraper { name: "stub", pages }));
        Collector::new(registry, 10, 4, 10)
    }

    #[tokio::test]
    async fn test_scrapes_links_and_drops_short_pages() {
        let c = collector(&[
            ("https://a.com", "a long enough page body"),
            ("https://b.com", "short"),
        ]);
        let retrievers: Vec<Box<dyn Retriever>> =
            vec![Box::new(MockRetriever::new(vec![link("https://a.com"), link("https://b.com")]))];
        let visited = VisitedUrls::new();
        let out = c.collect(2, &retrievers, &visited).await;
        assert_eq!(out.sources.len(), 1);
        assert_eq!(out.sources[0].url, "https://a.com");
        assert_eq!(out.sources[0].sub_query_index, 2);
        assert_eq!(out.sources[0].title, "stub https://a.com");
        assert_eq!(out.failures.len(), 1);
        assert!(out.failures[0].reason.contains("too short"));
        // A failed scrape still counts as visited.
        assert!(visited.contains("https://b.com"));
    }

    #[tokio::test]
    async fn test_dedups_across_retrievers_and_calls() {
        let c = collector(&[]);
        let direct = |url: &str| RetrievalResult::DirectContent {
            source: url.to_string(),
            raw_content: "content".to_string(),
            title: "t".to_string(),
            image_urls: Vec::new(),
        };
        let retrievers: Vec<Box<dyn Retriever>> = vec![
            Box::new(MockRetriever::direct(vec![direct("https://example.com/a"), direct("https://x.com")])),
            Box::new(MockRetriever::direct(vec![direct("https://example.com/a")])),
        ];
        let visited = VisitedUrls::new();
        let first = c.collect(0, &retrievers, &visited).await;
        assert_eq!(first.sources.len(), 2);
        assert_eq!(first.duplicates, 1);
        let mut second = c.collect(1, &retrievers, &visited).await;
        assert!(second.sources.is_empty());
        assert_eq!(second.duplicates, 1);
        assert_eq!(second.deferred.len(), 2);
        assert!(second.deferred.iter().all(|d| d.holder == 0));
        c.settle(&mut second, 1, &visited, Duration::from_secs(1)).await;
        assert!(second.sources.is_empty());
        assert!(second.deferred.is_empty());
        assert_eq!(second.duplicates, 3);
    }

    #[tokio::test]
    async fn test_settle_takes_over_released_urls() {
        let c = collector(&[("https://example.com/shared", "a long enough shared page")]);
        let retrievers: Vec<Box<dyn Retriever>> = vec![Box::new(MockRetriever::new(vec![link("https://example.com/shared")]))];
        let visited = VisitedUrls::new();
        assert_eq!(visited.claim("https://example.com/shared", 0), Claim::Claimed);

        let mut later = c.collect(1, &retrievers, &visited).await;
        assert!(later.sources.is_empty());
        assert_eq!(later.deferred.len(), 1);

        visited.release(0);
        c.settle(&mut later, 1, &visited, Duration::from_secs(1)).await;
        assert_eq!(later.sources.len(), 1);
        assert_eq!(later.sources[0].sub_query_index, 1);
        assert_eq!(later.duplicates, 0);
        assert_eq!(visited.owner("https://example.com/shared"), Some(1));
    }

    #[tokio::test]
    async fn test_settle_hands_stolen_urls_to_lower_index() {
        let c = collector(&[]);
        let direct = RetrievalResult::DirectContent {
            source: "https://example.com/a".to_string(),
            raw_content: "content".to_string(),
            title: "t".to_string(),
            image_urls: Vec::new(),
        };
        let retrievers: Vec<Box<dyn Retriever>> = vec![Box::new(MockRetriever::direct(vec![direct]))];
        let visited = VisitedUrls::new();
        let mut high = c.collect(3, &retrievers, &visited).await;
        let mut low = c.collect(1, &retrievers, &visited).await;
        assert_eq!((high.sources.len(), low.sources.len()), (1, 1));

        c.settle(&mut low, 1, &visited, Duration::from_secs(1)).await;
        c.settle(&mut high, 3, &visited, Duration::from_secs(1)).await;
        assert_eq!(low.sources.len(), 1);
        assert!(high.sources.is_empty());
        assert_eq!(high.duplicates, 1);
    }

    #[tokio::test]
    async fn test_preserves_retriever_order() {
        let pages: Vec<(String, String)> = (0..8)
            .map(|i| (format!("https://p.com/{i}"), "x".repeat(20)))
            .collect();
        let refs: Vec<(&str, &str)> = pages.iter().map(|(u, c)| (u.as_str(), c.as_str())).collect();
        let c = collector(&refs);
        let links = pages.iter().map(|(u, _)| link(u)).collect();
        let retrievers: Vec<Box<dyn Retriever>> = vec![Box::new(MockRetriever::new(links))];
        let out = c.collect(0, &retrievers, &VisitedUrls::new()).await;
        let urls: Vec<&str> = out.sources.iter().map(|s| s.url.as_str()).collect();
        let expected: Vec<&str> = pages.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(urls, expected);
    }
}
