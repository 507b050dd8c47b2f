//! Retrieval and curation engine.
//!
//! [`Collector`] fans a sub-query out to the configured retrievers,
//! deduplicates against the run's [`VisitedUrls`] and scrapes what needs
//! scraping. [`CurationEngine`] then filters, scores, diversifies and
//! selects the collected sources.

pub mod collect;
pub mod dedup;
pub mod diversity;
pub mod engine;
pub mod relevance;
pub mod scorer;
pub mod strategy;

pub use collect::{CollectFailure, Collected, Collector};
pub use dedup::{Claim, VisitedUrls, normalize_url};
pub use diversity::SourceCategory;
pub use engine::{
    CurationConfig, CurationEngine, CurationMode, CurationOutcome, Selection, apply_thresholds, select,
};
pub use relevance::{KeywordRelevance, LlmRelevance, RelevanceFilter};
pub use scorer::{HeuristicScorer, SourceScorer};
pub use strategy::{CurationStrategy, RELAX_FACTOR, ScoreThresholds, ScoreWeights, StrategyProfile};
