//! Curation engine: relevance filter, scoring, thresholds, diversity cap,
//! final selection and the fallback chain.
//!
//! Scores are annotated once per source. Selection is a pure function over
//! the stored scores, so the adaptive strategy can rerun it with relaxed
//! thresholds without rescoring anything.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::diversity::{SourceCategory, bonuses, cap_per_category};
use super::relevance::RelevanceFilter;
use super::scorer::SourceScorer;
use super::strategy::{CurationStrategy, RELAX_FACTOR, ScoreThresholds};
use crate::core::{CurationStage, Relevance, ScoreKind, SourceRecord, SourceScores};
use crate::error::CurationError;

/// Knobs the engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Run the full scoring pipeline instead of the relevance-only pass.
    pub dual_curation: bool,
    /// Weight and threshold profile.
    pub strategy: CurationStrategy,
    /// The adaptive strategy relaxes thresholds below this count.
    pub min_sources: usize,
    /// Hard cap on selected sources.
    pub max_sources: Option<usize>,
    /// Domains whose sources are always dropped (suffix match).
    pub exclude_domains: Vec<String>,
    /// When non-empty, a source must mention at least one keyword.
    pub require_keywords: Vec<String>,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            dual_curation: true,
            strategy: CurationStrategy::default(),
            min_sources: 3,
            max_sources: None,
            exclude_domains: Vec::new(),
            require_keywords: Vec::new(),
        }
    }
}

/// Which pass produced the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationMode {
    /// Relevance, scoring, thresholds and diversity.
    Dual,
    /// Relevance filter only.
    Single,
    /// Unscored passthrough after every filter failed.
    Raw,
}

/// Result of curating one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationOutcome {
    /// Selected sources, best first.
    pub selected: Vec<SourceRecord>,
    /// Rejected sources, each with a reason.
    pub rejected: Vec<SourceRecord>,
    /// Pass that produced the selection.
    pub mode: CurationMode,
    /// Degradations worth surfacing.
    pub warnings: Vec<String>,
}

impl CurationOutcome {
    fn empty(mode: CurationMode) -> Self {
        Self {
            selected: Vec::new(),
            rejected: Vec::new(),
            mode,
            warnings: Vec::new(),
        }
    }
}

/// Indices of the kept candidates, best first, plus the rejected ones with
/// their reasons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Kept indices, highest combined score first.
    pub kept: Vec<usize>,
    /// Rejected indices with reasons.
    pub rejected: Vec<(usize, String)>,
}

/// Indices whose scores meet every threshold.
#[must_use]
pub fn apply_thresholds(scores: &[SourceScores], thresholds: &ScoreThresholds) -> Vec<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| thresholds.violation(s).is_none())
        .map(|(i, _)| i)
        .collect()
}

/// Threshold rejection followed by the per-category cap.
#[must_use]
pub fn select(scores: &[SourceScores], categories: &[SourceCategory], thresholds: &ScoreThresholds) -> Selection {
    let mut rejected = Vec::new();
    let mut passing = Vec::new();
    for (i, (s, category)) in scores.iter().zip(categories).enumerate() {
        match thresholds.violation(s) {
            Some(reason) => rejected.push((i, reason)),
            None => passing.push((i, *category, s.combined.unwrap_or(0.0))),
        }
    }
    let (kept, dropped) = cap_per_category(&passing);
    rejected.extend(
        dropped
            .into_iter()
            .map(|(i, c)| (i, format!("{} sources over the diversity cap", c.as_str()))),
    );
    Selection { kept, rejected }
}

/// Filters, scores and selects sources.
pub struct CurationEngine {
    relevance: Arc<dyn RelevanceFilter>,
    scorer: Arc<dyn SourceScorer>,
    config: CurationConfig,
}

impl std::fmt::Debug for CurationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurationEngine")
            .field("relevance", &self.relevance.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CurationEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(relevance: Arc<dyn RelevanceFilter>, scorer: Arc<dyn SourceScorer>, config: CurationConfig) -> Self {
        Self {
            relevance,
            scorer,
            config,
        }
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &CurationConfig {
        &self.config
    }

    /// Curates `sources` for `query`.
    ///
    /// Never fails: the dual pass falls back to the relevance-only pass,
    /// which falls back to the first raw sources unscored. Custom filters
    /// apply whichever pass wins.
    pub async fn curate(&self, query: &str, sources: Vec<SourceRecord>) -> CurationOutcome {
        if sources.is_empty() {
            let mode = if self.config.dual_curation {
                CurationMode::Dual
            } else {
                CurationMode::Single
            };
            return CurationOutcome::empty(mode);
        }
        let before = sources.len();
        let mut warnings = Vec::new();

        if self.config.dual_curation {
            match self.dual(query, sources.clone()).await {
                Ok(outcome) => return self.finish(outcome, before),
                Err(e) => {
                    tracing::warn!(error = %e, "dual curation failed, falling back to relevance only");
                    warnings.push(format!("dual curation failed: {e}"));
                }
            }
        }

        let mut outcome = match self.single(query, sources.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "relevance curation failed, passing raw sources through");
                warnings.push(format!("relevance curation failed: {e}"));
                self.raw(sources)
            }
        };
        warnings.append(&mut outcome.warnings);
        outcome.warnings = warnings;
        self.finish(outcome, before)
    }

    async fn dual(&self, query: &str, sources: Vec<SourceRecord>) -> Result<CurationOutcome, CurationError> {
        let profile = self.config.strategy.profile();
        let (mut candidates, mut rejected) = self.filter_relevant(query, sources).await?;

        for source in &mut candidates {
            let quality = self.scorer.quality(source);
            let credibility = self.scorer.credibility(source);
            let freshness = self.scorer.freshness(source);
            source.annotate(ScoreKind::Quality, quality);
            source.annotate(ScoreKind::Credibility, credibility);
            source.annotate(ScoreKind::Freshness, freshness);
        }
        let categories: Vec<SourceCategory> = candidates
            .iter()
            .map(|s| SourceCategory::classify(&s.url, &s.title))
            .collect();
        let bonus = bonuses(&categories, profile.diversity_bonus);
        for (source, bonus) in candidates.iter_mut().zip(bonus) {
            source.annotate(ScoreKind::Diversity, bonus);
            let combined = profile.weights.weighted(&source.scores) + bonus;
            source.annotate(ScoreKind::Combined, combined);
        }

        let scores: Vec<SourceScores> = candidates.iter().map(|s| s.scores).collect();
        let mut warnings = Vec::new();
        let mut selection = select(&scores, &categories, &profile.thresholds);
        if selection.kept.len() < self.config.min_sources && profile.relax_on_shortfall {
            let relaxed = profile.thresholds.scaled(RELAX_FACTOR);
            let retry = select(&scores, &categories, &relaxed);
            tracing::info!(
                before = selection.kept.len(),
                after = retry.kept.len(),
                min_sources = self.config.min_sources,
                "relaxed curation thresholds"
            );
            warnings.push(format!(
                "only {} sources met the thresholds; relaxed them by {RELAX_FACTOR} and kept {}",
                selection.kept.len(),
                retry.kept.len()
            ));
            selection = retry;
        }

        let mut slots: Vec<Option<SourceRecord>> = candidates.into_iter().map(Some).collect();
        for (i, reason) in selection.rejected {
            if let Some(mut source) = slots.get_mut(i).and_then(Option::take) {
                source.advance(CurationStage::Scored);
                source.reject(reason);
                rejected.push(source);
            }
        }
        let selected = selection
            .kept
            .into_iter()
            .filter_map(|i| slots.get_mut(i).and_then(Option::take))
            .map(|mut source| {
                source.advance(CurationStage::Diversified);
                source
            })
            .collect();

        Ok(CurationOutcome {
            selected,
            rejected,
            mode: CurationMode::Dual,
            warnings,
        })
    }

    async fn single(&self, query: &str, sources: Vec<SourceRecord>) -> Result<CurationOutcome, CurationError> {
        let (mut selected, rejected) = self.filter_relevant(query, sources).await?;
        selected.sort_by(|a, b| {
            let a = a.scores.relevance.unwrap_or(0.0);
            let b = b.scores.relevance.unwrap_or(0.0);
            b.total_cmp(&a)
        });
        for source in &mut selected {
            source.annotate(ScoreKind::Combined, source.scores.relevance.unwrap_or(0.0));
        }
        Ok(CurationOutcome {
            selected,
            rejected,
            mode: CurationMode::Single,
            warnings: Vec::new(),
        })
    }

    fn raw(&self, sources: Vec<SourceRecord>) -> CurationOutcome {
        let take = self.config.max_sources.unwrap_or(sources.len());
        let mut outcome = CurationOutcome::empty(CurationMode::Raw);
        outcome.selected = sources.into_iter().take(take).collect();
        outcome
    }

    /// Runs the relevance filter. Relevant sources get their baseline score,
    /// the rest come back rejected.
    async fn filter_relevant(
        &self,
        query: &str,
        sources: Vec<SourceRecord>,
    ) -> Result<(Vec<SourceRecord>, Vec<SourceRecord>), CurationError> {
        let verdicts = self.relevance.judge(query, &sources).await?;
        if verdicts.len() != sources.len() {
            return Err(CurationError::VerdictMismatch {
                expected: sources.len(),
                got: verdicts.len(),
            });
        }
        let mut kept = Vec::new();
        let mut rejected = Vec::new();
        for (mut source, verdict) in sources.into_iter().zip(verdicts) {
            if verdict == Relevance::None {
                source.reject(format!("judged not relevant by {} filter", self.relevance.name()));
                rejected.push(source);
            } else if verdict.meets_threshold(Relevance::Low) {
                source.annotate(ScoreKind::Relevance, verdict.baseline_score());
                source.advance(CurationStage::RelevanceFiltered);
                kept.push(source);
            }
        }
        tracing::debug!(
            filter = self.relevance.name(),
            kept = kept.len(),
            rejected = rejected.len(),
            "relevance filter applied"
        );
        Ok((kept, rejected))
    }

    /// Truncation, custom filters and final stage marking.
    fn finish(&self, mut outcome: CurationOutcome, before: usize) -> CurationOutcome {
        if let Some(max) = self.config.max_sources
            && outcome.selected.len() > max
        {
            for mut source in outcome.selected.split_off(max) {
                source.reject(format!("beyond the {max}-source limit"));
                outcome.rejected.push(source);
            }
        }

        let (selected, dropped): (Vec<_>, Vec<_>) = outcome
            .selected
            .into_iter()
            .map(|s| {
                let reason = self.custom_filter_reason(&s);
                (s, reason)
            })
            .partition(|(_, reason)| reason.is_none());
        outcome.selected = selected.into_iter().map(|(s, _)| s).collect();
        for (mut source, reason) in dropped {
            source.reject(reason.unwrap_or_default());
            outcome.rejected.push(source);
        }

        for source in &mut outcome.selected {
            source.advance(CurationStage::Selected);
        }
        if outcome.mode == CurationMode::Dual && outcome.selected.len() < self.config.min_sources {
            outcome.warnings.push(format!(
                "curation kept {} sources, fewer than the minimum of {}",
                outcome.selected.len(),
                self.config.min_sources
            ));
        }
        tracing::info!(
            mode = ?outcome.mode,
            strategy = %self.config.strategy,
            before,
            selected = outcome.selected.len(),
            rejected = outcome.rejected.len(),
            "curation finished"
        );
        outcome
    }

    fn custom_filter_reason(&self, source: &SourceRecord) -> Option<String> {
        if let Some(domain) = source.domain() {
            let excluded = self.config.exclude_domains.iter().find(|d| {
                let d = d.trim().trim_start_matches("www.").to_lowercase();
                !d.is_empty() && (domain == d || domain.ends_with(&format!(".{d}")))
            });
            if let Some(d) = excluded {
                return Some(format!("domain {d} is excluded"));
            }
        }
        if self.config.require_keywords.is_empty() {
            return None;
        }
        let haystack = format!("{} {}", source.title, source.raw_content).to_lowercase();
        let matched = self
            .config
            .require_keywords
            .iter()
            .any(|k| haystack.contains(&k.trim().to_lowercase()));
        (!matched).then(|| "missing every required keyword".to_string())
    }
}
