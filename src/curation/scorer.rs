//! Quality, credibility and freshness heuristics.

use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;

use crate::core::SourceRecord;

/// Scores a source on the non-relevance axes. Every score is in `[0, 1]`.
pub trait SourceScorer: Send + Sync {
    /// Quality of the content.
    fn quality(&self, source: &SourceRecord) -> f64;
    /// Trustworthiness of the outlet.
    fn credibility(&self, source: &SourceRecord) -> f64;
    /// Recency.
    fn freshness(&self, source: &SourceRecord) -> f64;
}

const QUALITY_TERMS: &[&str] = &[
    "study",
    "research",
    "journal",
    "university",
    "institute",
    "analysis",
    "data",
    "evidence",
    "survey",
    "statistics",
    "findings",
    "methodology",
    "published",
    "according to",
    "report",
];

const CREDIBILITY_TERMS: &[&str] = &[
    ".edu",
    ".gov",
    ".org",
    "peer-reviewed",
    "peer reviewed",
    "doi.org",
    "doi:",
    "arxiv",
    "pubmed",
    "official",
    "citation",
    "professor",
    "reuters",
    "nature.com",
];

const QUALITY_BASE: f64 = 0.4;
const QUALITY_STEP: f64 = 0.1;
const CREDIBILITY_BASE: f64 = 0.4;
const CREDIBILITY_STEP: f64 = 0.15;
const FRESHNESS_UNKNOWN: f64 = 0.5;

static YEAR: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\b(19[5-9]\d|20\d{2})\b").ok());

/// Keyword-counting scorer.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicScorer {
    current_year: i32,
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::with_year(chrono::Utc::now().year())
    }
}

impl HeuristicScorer {
    /// A scorer that treats `year` as the current year.
    #[must_use]
    pub const fn with_year(year: i32) -> Self {
        Self { current_year: year }
    }
}

#[allow(clippy::cast_precision_loss)]
fn indicator_score(haystack: &str, terms: &[&str], base: f64, step: f64) -> f64 {
    let count = terms.iter().filter(|t| haystack.contains(*t)).count();
    (base + count as f64 * step).min(1.0)
}

impl SourceScorer for HeuristicScorer {
    fn quality(&self, source: &SourceRecord) -> f64 {
        let haystack = format!("{} {}", source.title, source.raw_content).to_lowercase();
        indicator_score(&haystack, QUALITY_TERMS, QUALITY_BASE, QUALITY_STEP)
    }

    fn credibility(&self, source: &SourceRecord) -> f64 {
        let haystack = format!("{} {}", source.url, source.raw_content).to_lowercase();
        indicator_score(&haystack, CREDIBILITY_TERMS, CREDIBILITY_BASE, CREDIBILITY_STEP)
    }

    fn freshness(&self, source: &SourceRecord) -> f64 {
        let Some(year_re) = YEAR.as_ref() else {
            return FRESHNESS_UNKNOWN;
        };
        let text = format!("{} {}", source.title, source.raw_content);
        let newest = year_re
            .find_iter(&text)
            .filter_map(|m| m.as_str().parse::<i32>().ok())
            .filter(|y| *y <= self.current_year)
            .max();
        match newest.map(|y| self.current_year - y) {
            None => FRESHNESS_UNKNOWN,
            Some(0) => 1.0,
            Some(1) => 0.8,
            Some(2) => 0.6,
            Some(3..=5) => 0.4,
            Some(_) => 0.2,
        }
    }
}
