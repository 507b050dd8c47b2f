//! Relevance level assigned by the primary curation filter.
//!
//! The filter (LLM judgment or keyword heuristic) labels each candidate
//! source; the label is then mapped to the baseline relevance score that
//! feeds the weighted combined score.

use serde::{Deserialize, Serialize};

/// Relevance level of a source, ordered from highest to lowest.
///
/// Discriminants are inverted (`High = 0`, `None = 3`) so that the
/// derived [`Ord`] implementation sorts high-relevance sources first.
/// [`meets_threshold`](Relevance::meets_threshold) relies on this:
/// `(self as u8) <= (threshold as u8)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    /// Not relevant to the query; rejected by the primary filter.
    None = 3,
    /// Low relevance.
    Low = 2,
    /// Medium relevance.
    Medium = 1,
    /// High relevance.
    High = 0,
}

impl Relevance {
    /// Parses a relevance string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            _ => Self::None,
        }
    }

    /// Returns `true` if this relevance meets or exceeds the threshold.
    #[must_use]
    pub const fn meets_threshold(self, threshold: Self) -> bool {
        (self as u8) <= (threshold as u8)
    }

    /// Baseline relevance score in `[0, 1]` given to a source that passed
    /// the primary filter with this label.
    #[must_use]
    pub const fn baseline_score(self) -> f64 {
        match self {
            Self::High => 0.9,
            Self::Medium => 0.75,
            Self::Low => 0.55,
            Self::None => 0.0,
        }
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Relevance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_ordering() {
        assert!(Relevance::High < Relevance::Medium);
        assert!(Relevance::Medium < Relevance::Low);
        assert!(Relevance::Low < Relevance::None);
    }

    #[test]
    fn test_relevance_parse() {
        assert_eq!(Relevance::parse("high"), Relevance::High);
        assert_eq!(Relevance::parse(" HIGH "), Relevance::High);
        assert_eq!(Relevance::parse("Medium"), Relevance::Medium);
        assert_eq!(Relevance::parse("low"), Relevance::Low);
        assert_eq!(Relevance::parse("unknown"), Relevance::None);
    }

    #[test]
    fn test_relevance_threshold() {
        assert!(Relevance::High.meets_threshold(Relevance::High));
        assert!(Relevance::High.meets_threshold(Relevance::Low));
        assert!(!Relevance::Low.meets_threshold(Relevance::High));
        assert!(!Relevance::None.meets_threshold(Relevance::Low));
    }

    #[test]
    fn test_baseline_scores_follow_ordering() {
        assert!(Relevance::High.baseline_score() > Relevance::Medium.baseline_score());
        assert!(Relevance::Medium.baseline_score() > Relevance::Low.baseline_score());
        assert!(Relevance::None.baseline_score().abs() < f64::EPSILON);
    }

    #[test]
    fn test_relevance_display() {
        assert_eq!(format!("{}", Relevance::High), "high");
        assert_eq!(format!("{}", Relevance::None), "none");
    }
}
