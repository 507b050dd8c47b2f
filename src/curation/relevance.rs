//! Primary relevance filters.
//!
//! A filter labels every candidate with a [`Relevance`] level; sources
//! labelled `none` are rejected and the rest get the level's baseline
//! score. The LLM filter is the default when a provider is configured,
//! and the keyword heuristic stands in for it otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use unicode_segmentation::UnicodeSegmentation;

use crate::agent::relevance::{Candidate, RelevanceAgent};
use crate::agent::LlmProvider;
use crate::core::{Relevance, SourceRecord};
use crate::error::CurationError;
use crate::retry::RetryPolicy;

/// Labels candidate sources for a query.
#[async_trait]
pub trait RelevanceFilter: Send + Sync {
    /// Filter name, for logs.
    fn name(&self) -> &'static str;

    /// One verdict per source, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`CurationError`] when the verdicts cannot be produced.
    async fn judge(&self, query: &str, sources: &[SourceRecord]) -> Result<Vec<Relevance>, CurationError>;
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "what", "which", "who", "whom", "how", "why", "when",
    "where", "with", "from", "that", "this", "these", "those", "about", "into", "over", "than",
    "then", "there", "their", "they", "have", "has", "had", "been", "being", "does", "did", "can",
    "could", "should", "would", "will", "its", "not", "but", "all", "any", "more", "most", "lately",
];

/// Significant lowercase query terms.
pub(crate) fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect();
    terms.sort_unstable();
    terms.dedup();
    terms
}

/// Keyword-overlap heuristic. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRelevance;

impl KeywordRelevance {
    /// Level for one source.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn level(terms: &[String], source: &SourceRecord) -> Relevance {
        if terms.is_empty() {
            return Relevance::Medium;
        }
        let haystack = format!("{} {}", source.title, source.raw_content).to_lowercase();
        let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        let fraction = hits as f64 / terms.len() as f64;
        if fraction >= 0.6 {
            Relevance::High
        } else if fraction >= 0.3 {
            Relevance::Medium
        } else if hits > 0 {
            Relevance::Low
        } else {
            Relevance::None
        }
    }
}

#[async_trait]
impl RelevanceFilter for KeywordRelevance {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn judge(&self, query: &str, sources: &[SourceRecord]) -> Result<Vec<Relevance>, CurationError> {
        let terms = query_terms(query);
        Ok(sources.iter().map(|s| Self::level(&terms, s)).collect())
    }
}

/// Characters of each source shown to the model.
const EXCERPT_CHARS: usize = 600;
/// Sources judged per call.
const BATCH_SIZE: usize = 15;

/// Asks the fast model to label sources in batches.
pub struct LlmRelevance {
    agent: RelevanceAgent,
    provider: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl LlmRelevance {
    /// Creates the filter.
    #[must_use]
    pub fn new(agent: RelevanceAgent, provider: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { agent, provider, retry }
    }
}

impl std::fmt::Debug for LlmRelevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmRelevance")
            .field("provider", &self.provider.name())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn excerpt(text: &str) -> String {
    text.graphemes(true).take(EXCERPT_CHARS).collect()
}

#[async_trait]
impl RelevanceFilter for LlmRelevance {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn judge(&self, query: &str, sources: &[SourceRecord]) -> Result<Vec<Relevance>, CurationError> {
        let mut verdicts = Vec::with_capacity(sources.len());
        for (batch_no, batch) in sources.chunks(BATCH_SIZE).enumerate() {
            let excerpts: Vec<String> = batch.iter().map(|s| excerpt(&s.raw_content)).collect();
            let candidates: Vec<Candidate<'_>> = batch
                .iter()
                .zip(&excerpts)
                .enumerate()
                .map(|(i, (s, ex))| Candidate {
                    id: i,
                    title: &s.title,
                    url: &s.url,
                    excerpt: ex,
                })
                .collect();
            let (labels, _) = self
                .agent
                .judge(self.provider.as_ref(), query, &candidates, &self.retry)
                .await
                .map_err(|e| CurationError::Relevance(e.to_string()))?;
            let by_id: HashMap<usize, Relevance> = labels.into_iter().map(|v| (v.id, v.relevance)).collect();
            if (0..batch.len()).any(|i| !by_id.contains_key(&i)) {
                return Err(CurationError::VerdictMismatch {
                    expected: batch.len(),
                    got: by_id.len(),
                });
            }
            tracing::debug!(batch = batch_no, size = batch.len(), "relevance batch judged");
            verdicts.extend((0..batch.len()).filter_map(|i| by_id.get(&i).copied()));
        }
        Ok(verdicts)
    }
}
