//! Retrieved sources and their curation annotations.

use serde::{Deserialize, Serialize};

/// One item returned by a retriever.
///
/// Retrievers either point at a page that still has to be scraped, or hand
/// back the content directly. The curation engine matches on the variant
/// instead of checking for fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalResult {
    /// A link that must be scraped before its content is usable.
    NeedsScrape {
        /// Page URL.
        href: String,
        /// Title from the search result, if any.
        #[serde(default)]
        title: Option<String>,
        /// Search snippet.
        #[serde(default)]
        body: String,
    },
    /// Content that is ready to use as-is.
    DirectContent {
        /// URL or stable identifier of the content.
        source: String,
        /// Full text.
        raw_content: String,
        /// Title.
        title: String,
        /// Image URLs found alongside the content.
        #[serde(default)]
        image_urls: Vec<String>,
    },
}

impl RetrievalResult {
    /// The identifying URL of this result.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::NeedsScrape { href, .. } => href,
            Self::DirectContent { source, .. } => source,
        }
    }
}

/// Stage a source reached in the curation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationStage {
    /// Collected and deduplicated, not yet curated.
    Collected,
    /// Passed the primary relevance filter.
    RelevanceFiltered,
    /// Scored and above every threshold.
    Scored,
    /// Kept by the diversity optimizer.
    Diversified,
    /// In the final selection.
    Selected,
    /// Dropped; see the rejection reason.
    Rejected,
}

/// Curation scores, each in `[0, 1]` (the combined score may carry a
/// diversity bonus of up to `+0.1`).
///
/// Every score is written once. Later writes with a different value are
/// refused so that a finished stage is never silently rewritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceScores {
    /// Score from the primary relevance filter.
    pub relevance: Option<f64>,
    /// Quality-indicator heuristic.
    pub quality: Option<f64>,
    /// Credibility-indicator heuristic.
    pub credibility: Option<f64>,
    /// Recency heuristic.
    pub freshness: Option<f64>,
    /// Diversity bonus applied to the combined score.
    pub diversity: Option<f64>,
    /// Weighted combination.
    pub combined: Option<f64>,
}

/// Which score slot to annotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ScoreKind {
    Relevance,
    Quality,
    Credibility,
    Freshness,
    Diversity,
    Combined,
}

impl SourceScores {
    fn slot(&mut self, kind: ScoreKind) -> &mut Option<f64> {
        match kind {
            ScoreKind::Relevance => &mut self.relevance,
            ScoreKind::Quality => &mut self.quality,
            ScoreKind::Credibility => &mut self.credibility,
            ScoreKind::Freshness => &mut self.freshness,
            ScoreKind::Diversity => &mut self.diversity,
            ScoreKind::Combined => &mut self.combined,
        }
    }

    /// Value of a score slot.
    #[must_use]
    pub const fn get(&self, kind: ScoreKind) -> Option<f64> {
        match kind {
            ScoreKind::Relevance => self.relevance,
            ScoreKind::Quality => self.quality,
            ScoreKind::Credibility => self.credibility,
            ScoreKind::Freshness => self.freshness,
            ScoreKind::Diversity => self.diversity,
            ScoreKind::Combined => self.combined,
        }
    }
}

/// A unit of retrieved information.
///
/// The URL is the identity of a source within a run; deduplication keeps
/// it unique across every sub-query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// URL or identifier.
    pub url: String,
    /// Title.
    pub title: String,
    /// Extracted text.
    pub raw_content: String,
    /// Length of `raw_content` in characters.
    pub content_length: usize,
    /// Retriever that surfaced this source.
    pub retriever_origin: String,
    /// Whether scraping (when required) produced usable content.
    pub scrape_success: bool,
    /// Image URLs associated with the source.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    /// Dispatch index of the sub-query that surfaced this source.
    pub sub_query_index: usize,
    /// Curation scores.
    #[serde(default)]
    pub scores: SourceScores,
    /// Furthest curation stage reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curation_stage: Option<CurationStage>,
    /// Why the source was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl SourceRecord {
    /// Creates a freshly collected source.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        raw_content: impl Into<String>,
        retriever_origin: impl Into<String>,
    ) -> Self {
        let raw_content = raw_content.into();
        Self {
            url: url.into(),
            title: title.into(),
            content_length: raw_content.chars().count(),
            raw_content,
            retriever_origin: retriever_origin.into(),
            scrape_success: true,
            image_urls: Vec::new(),
            sub_query_index: 0,
            scores: SourceScores::default(),
            curation_stage: Some(CurationStage::Collected),
            rejection_reason: None,
        }
    }

    /// Records a score. Returns `false` (and keeps the existing value) when
    /// the slot already holds a different value.
    pub fn annotate(&mut self, kind: ScoreKind, value: f64) -> bool {
        let slot = self.scores.slot(kind);
        match *slot {
            Some(existing) if (existing - value).abs() > f64::EPSILON => {
                tracing::warn!(
                    url = %self.url,
                    ?kind,
                    existing,
                    attempted = value,
                    "refusing to overwrite curation score"
                );
                false
            }
            _ => {
                *slot = Some(value);
                true
            }
        }
    }

    /// Advances the curation stage. A rejected source stays rejected.
    pub fn advance(&mut self, stage: CurationStage) {
        if self.curation_stage != Some(CurationStage::Rejected) {
            self.curation_stage = Some(stage);
        }
    }

    /// Marks the source rejected; the first recorded reason wins.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.curation_stage = Some(CurationStage::Rejected);
        if self.rejection_reason.is_none() {
            self.rejection_reason = Some(reason.into());
        }
    }

    /// Combined score, or `0.0` when unscored.
    #[must_use]
    pub fn combined_score(&self) -> f64 {
        self.scores.combined.unwrap_or(0.0)
    }

    /// Host part of the URL, lowercased, without a leading `www.`.
    #[must_use]
    pub fn domain(&self) -> Option<String> {
        url::Url::parse(&self.url).ok().and_then(|u| {
            u.host_str()
                .map(|h| h.trim_start_matches("www.").to_lowercase())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_counts_chars() {
        let s = SourceRecord::new("https://a.com", "A", "héllo", "mock");
        assert_eq!(s.content_length, 5);
        assert_eq!(s.curation_stage, Some(CurationStage::Collected));
    }

    #[test]
    fn test_annotate_is_write_once() {
        let mut s = SourceRecord::new("https://a.com", "A", "text", "mock");
        assert!(s.annotate(ScoreKind::Quality, 0.5));
        assert!(s.annotate(ScoreKind::Quality, 0.5));
        assert!(!s.annotate(ScoreKind::Quality, 0.9));
        assert_eq!(s.scores.quality, Some(0.5));
    }

    #[test]
    fn test_reject_keeps_first_reason() {
        let mut s = SourceRecord::new("https://a.com", "A", "text", "mock");
        s.reject("too short");
        s.reject("low quality");
        s.advance(CurationStage::Selected);
        assert_eq!(s.rejection_reason.as_deref(), Some("too short"));
        assert_eq!(s.curation_stage, Some(CurationStage::Rejected));
    }

    #[test]
    fn test_domain_strips_www() {
        let s = SourceRecord::new("https://www.Nature.com/articles/1", "", "", "mock");
        assert_eq!(s.domain().as_deref(), Some("nature.com"));
        let bad = SourceRecord::new("local:notes.md", "", "", "local");
        assert_eq!(bad.domain(), None);
    }

    #[test]
    fn test_retrieval_result_url() {
        let a = RetrievalResult::NeedsScrape {
            href: "https://x.org".to_string(),
            title: None,
            body: String::new(),
        };
        let b = RetrievalResult::DirectContent {
            source: "arxiv:1234".to_string(),
            raw_content: "abstract".to_string(),
            title: "Paper".to_string(),
            image_urls: Vec::new(),
        };
        assert_eq!(a.url(), "https://x.org");
        assert_eq!(b.url(), "arxiv:1234");
    }
}
