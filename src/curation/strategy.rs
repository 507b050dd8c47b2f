//! Curation strategies: fixed weight and threshold profiles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::SourceScores;

/// Factor applied to every threshold by the adaptive relax pass.
pub const RELAX_FACTOR: f64 = 0.8;

/// How sources are weighed and filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationStrategy {
    /// Relevance dominates.
    RelevanceFirst,
    /// Quality dominates.
    QualityFirst,
    /// Even weighting (default).
    #[default]
    Balanced,
    /// High thresholds, no diversity bonus.
    Strict,
    /// Balanced, but relaxes thresholds once when too few sources survive.
    Adaptive,
}

impl CurationStrategy {
    /// All strategies.
    pub const ALL: [Self; 5] = [
        Self::RelevanceFirst,
        Self::QualityFirst,
        Self::Balanced,
        Self::Strict,
        Self::Adaptive,
    ];

    /// Snake-case identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RelevanceFirst => "relevance_first",
            Self::QualityFirst => "quality_first",
            Self::Balanced => "balanced",
            Self::Strict => "strict",
            Self::Adaptive => "adaptive",
        }
    }

    /// Weights, thresholds and bonus for this strategy.
    #[must_use]
    pub const fn profile(self) -> StrategyProfile {
        match self {
            Self::RelevanceFirst => StrategyProfile {
                weights: ScoreWeights::new(0.5, 0.2, 0.2, 0.1),
                thresholds: ScoreThresholds::new(0.6, 0.3, 0.3, 0.0, 0.5),
                diversity_bonus: 0.05,
                relax_on_shortfall: false,
            },
            Self::QualityFirst => StrategyProfile {
                weights: ScoreWeights::new(0.25, 0.4, 0.25, 0.1),
                thresholds: ScoreThresholds::new(0.4, 0.5, 0.4, 0.0, 0.5),
                diversity_bonus: 0.05,
                relax_on_shortfall: false,
            },
            Self::Balanced => StrategyProfile {
                weights: ScoreWeights::new(0.35, 0.25, 0.25, 0.15),
                thresholds: ScoreThresholds::new(0.5, 0.35, 0.35, 0.0, 0.45),
                diversity_bonus: 0.1,
                relax_on_shortfall: false,
            },
            Self::Strict => StrategyProfile {
                weights: ScoreWeights::new(0.3, 0.3, 0.3, 0.1),
                thresholds: ScoreThresholds::new(0.7, 0.6, 0.6, 0.2, 0.65),
                diversity_bonus: 0.0,
                relax_on_shortfall: false,
            },
            Self::Adaptive => StrategyProfile {
                weights: ScoreWeights::new(0.35, 0.25, 0.25, 0.15),
                thresholds: ScoreThresholds::new(0.5, 0.35, 0.35, 0.0, 0.45),
                diversity_bonus: 0.1,
                relax_on_shortfall: true,
            },
        }
    }
}

impl fmt::Display for CurationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("expected one of: {}", names.join(", "))
            })
    }
}

/// Weights over the four base scores. Sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ScoreWeights {
    pub relevance: f64,
    pub quality: f64,
    pub credibility: f64,
    pub freshness: f64,
}

impl ScoreWeights {
    /// Creates a weight vector.
    #[must_use]
    pub const fn new(relevance: f64, quality: f64, credibility: f64, freshness: f64) -> Self {
        Self {
            relevance,
            quality,
            credibility,
            freshness,
        }
    }

    /// Weighted sum of the base scores. Missing scores count as zero.
    #[must_use]
    pub fn weighted(&self, scores: &SourceScores) -> f64 {
        self.relevance * scores.relevance.unwrap_or(0.0)
            + self.quality * scores.quality.unwrap_or(0.0)
            + self.credibility * scores.credibility.unwrap_or(0.0)
            + self.freshness * scores.freshness.unwrap_or(0.0)
    }
}

/// Minimum scores a source must reach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ScoreThresholds {
    pub relevance: f64,
    pub quality: f64,
    pub credibility: f64,
    pub freshness: f64,
    pub combined: f64,
}

impl ScoreThresholds {
    /// Creates a threshold set.
    #[must_use]
    pub const fn new(relevance: f64, quality: f64, credibility: f64, freshness: f64, combined: f64) -> Self {
        Self {
            relevance,
            quality,
            credibility,
            freshness,
            combined,
        }
    }

    /// Every threshold multiplied by `factor`.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            relevance: self.relevance * factor,
            quality: self.quality * factor,
            credibility: self.credibility * factor,
            freshness: self.freshness * factor,
            combined: self.combined * factor,
        }
    }

    /// The first threshold `scores` misses, as a rejection reason.
    #[must_use]
    pub fn violation(&self, scores: &SourceScores) -> Option<String> {
        let checks = [
            ("relevance", scores.relevance, self.relevance),
            ("quality", scores.quality, self.quality),
            ("credibility", scores.credibility, self.credibility),
            ("freshness", scores.freshness, self.freshness),
            ("combined", scores.combined, self.combined),
        ];
        checks.into_iter().find_map(|(name, value, min)| {
            let value = value.unwrap_or(0.0);
            (value < min).then(|| format!("{name} score {value:.2} below threshold {min:.2}"))
        })
    }
}

/// Everything a strategy fixes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// Combined-score weights.
    pub weights: ScoreWeights,
    /// Rejection thresholds.
    pub thresholds: ScoreThresholds,
    /// Bonus for sources from under-represented categories, at most 0.1.
    pub diversity_bonus: f64,
    /// Whether to relax thresholds once when too few sources survive.
    pub relax_on_shortfall: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_weights_sum_to_one() {
        for strategy in CurationStrategy::ALL {
            let w = strategy.profile().weights;
            let sum = w.relevance + w.quality + w.credibility + w.freshness;
            assert!((sum - 1.0).abs() < 1e-9, "{strategy}: {sum}");
            assert!(strategy.profile().diversity_bonus <= 0.1);
        }
    }

    #[test_case("balanced", CurationStrategy::Balanced)]
    #[test_case("Relevance-First", CurationStrategy::RelevanceFirst)]
    #[test_case("adaptive", CurationStrategy::Adaptive)]
    fn test_parse(input: &str, expected: CurationStrategy) {
        assert_eq!(input.parse::<CurationStrategy>(), Ok(expected));
    }

    #[test]
    fn test_only_adaptive_relaxes() {
        let relaxing: Vec<CurationStrategy> = CurationStrategy::ALL
            .into_iter()
            .filter(|s| s.profile().relax_on_shortfall)
            .collect();
        assert_eq!(relaxing, vec![CurationStrategy::Adaptive]);
    }

    #[test]
    fn test_violation_reports_first_miss() {
        let t = ScoreThresholds::new(0.5, 0.5, 0.5, 0.0, 0.5);
        let scores = SourceScores {
            relevance: Some(0.9),
            quality: Some(0.2),
            credibility: Some(0.1),
            freshness: Some(0.5),
            diversity: None,
            combined: Some(0.6),
        };
        let reason = t.violation(&scores).unwrap_or_default();
        assert!(reason.starts_with("quality score 0.20"));
        assert_eq!(t.scaled(0.0).violation(&scores), None);
    }
}
