//! Per-run state passed through the pipeline.

use std::sync::Arc;
use std::time::Instant;

use crate::core::Query;
use crate::curation::VisitedUrls;
use crate::planner::{BudgetLimits, ResearchPlan};

use super::sink::ProgressSink;
use super::state::{PipelineState, StateTracker};

/// Everything one run owns: the query, its plan and budget ledger, the
/// visited-URL set, the progress sink, the state log and the warnings.
///
/// Created fresh for every run and never shared between runs.
pub struct RunContext {
    /// The research question and report parameters.
    pub query: Query,
    /// Steps and budgets.
    pub plan: Arc<ResearchPlan>,
    /// URLs already retrieved in this run.
    pub visited: Arc<VisitedUrls>,
    /// Progress sink.
    pub sink: Arc<dyn ProgressSink>,
    /// Whether budget limits halt work.
    pub enforce_budget: bool,
    started: Instant,
    states: StateTracker,
    warnings: Vec<String>,
}

impl RunContext {
    /// Starts a run.
    #[must_use]
    pub fn new(query: Query, limits: BudgetLimits, enforce_budget: bool, sink: Arc<dyn ProgressSink>) -> Self {
        let started = Instant::now();
        Self {
            plan: Arc::new(ResearchPlan::new(query.text.clone(), limits)),
            query,
            visited: Arc::new(VisitedUrls::new()),
            sink,
            enforce_budget,
            started,
            states: StateTracker::new(started),
            warnings: Vec::new(),
        }
    }

    /// Enters `state` and reports it to the sink.
    pub fn transition(&mut self, state: PipelineState) {
        self.states.advance(state);
        self.sink.log(&format!("stage: {}", state_label(state)));
    }

    /// Records a warning for the outcome.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(warning = %message, "research run degraded");
        self.sink.log(&message);
        self.warnings.push(message);
    }

    /// Whether an enforced budget is exhausted.
    #[must_use]
    pub fn should_halt(&self) -> bool {
        self.plan.should_halt(self.enforce_budget)
    }

    /// Records a warning naming the exhausted budgets, once per run.
    pub fn note_halt(&mut self) {
        let exhausted = self.plan.exhausted_budgets().join(", ");
        let message = format!("budget exhausted ({exhausted}); continuing with partial results");
        if !self.warnings.contains(&message) {
            self.warn(message);
        }
    }

    /// The state tracker.
    #[must_use]
    pub const fn states(&self) -> &StateTracker {
        &self.states
    }

    /// Warnings so far.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Milliseconds since the run started.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("query", &self.query.text)
            .field("state", &self.states.current())
            .field("visited", &self.visited.len())
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

const fn state_label(state: PipelineState) -> &'static str {
    match state {
        PipelineState::PersonaSelect => "persona selection",
        PipelineState::SubQueryGen => "sub-query generation",
        PipelineState::Retrieve => "retrieval",
        PipelineState::Curate => "curation",
        PipelineState::AssembleContext => "context assembly",
        PipelineState::RagSectionDraft => "section drafting",
        PipelineState::Synthesize => "synthesis",
        PipelineState::Assemble => "assembly",
        PipelineState::Done => "done",
        PipelineState::Aborted => "aborted",
    }
}
