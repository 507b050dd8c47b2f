//! What a research run returns.

use serde::{Deserialize, Serialize};

use crate::agent::Persona;
use crate::context::IterationRecord;
use crate::core::{Query, Report, SourceRecord};
use crate::curation::CurationMode;
use crate::planner::PlanTrace;

use super::state::{PipelineState, StateVisit};

/// A source that did not make the curated set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedSource {
    /// Source URL.
    pub url: String,
    /// Title, when known.
    pub title: String,
    /// Why it was dropped.
    pub reason: String,
}

/// The complete result of a research run.
///
/// Always carries a report; when the run degraded, `warnings` says how, and
/// when it aborted, `error` says why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    /// The question and report parameters.
    pub query: Query,
    /// Persona used for writing.
    pub persona: Persona,
    /// Sub-queries in dispatch order.
    pub sub_queries: Vec<String>,
    /// The synthesized report.
    pub report: Report,
    /// The report rendered as markdown.
    pub report_text: String,
    /// Curated sources.
    pub sources: Vec<SourceRecord>,
    /// Sources dropped during collection or curation.
    pub rejected: Vec<RejectedSource>,
    /// Curation pass that produced `sources`.
    pub curation_mode: CurationMode,
    /// Per-sub-query iteration records.
    pub iterations: Vec<IterationRecord>,
    /// Planner snapshot with budget usage.
    pub plan: PlanTrace,
    /// States entered, in order.
    pub states: Vec<StateVisit>,
    /// Terminal state.
    pub final_state: PipelineState,
    /// Degradations, in the order they happened.
    pub warnings: Vec<String>,
    /// Failure reason when the run aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tokens used across every LLM call.
    pub total_tokens: u64,
    /// Cost in USD across every LLM call.
    pub total_cost: f64,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

impl ResearchOutcome {
    /// Whether the run reached [`PipelineState::Done`].
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    /// URLs of the curated sources.
    #[must_use]
    pub fn source_urls(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.url.as_str()).collect()
    }
}
