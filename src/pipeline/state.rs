//! Pipeline states and the transition log.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A stage of the synthesis pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Choosing the persona.
    PersonaSelect,
    /// Generating sub-queries.
    SubQueryGen,
    /// Running sub-query iterations.
    Retrieve,
    /// Curating collected sources.
    Curate,
    /// Merging curated sources into the working context.
    AssembleContext,
    /// Drafting sections over narrowed context.
    RagSectionDraft,
    /// Writing the body, introduction, conclusion and frame.
    Synthesize,
    /// Building the final report.
    Assemble,
    /// Finished.
    Done,
    /// Stopped by an unrecoverable failure; a partial report is returned.
    Aborted,
}

impl PipelineState {
    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Whether `next` may follow `self`.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        use PipelineState::{
            Aborted, Assemble, AssembleContext, Curate, Done, PersonaSelect, RagSectionDraft, Retrieve,
            SubQueryGen, Synthesize,
        };
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Aborted)
                | (PersonaSelect, SubQueryGen)
                | (SubQueryGen, Retrieve)
                | (Retrieve, Curate)
                | (Curate, AssembleContext)
                | (AssembleContext, RagSectionDraft | Synthesize | Assemble)
                | (RagSectionDraft, Synthesize | Assemble)
                | (Synthesize, Assemble)
                | (Assemble, Done)
        )
    }
}

/// One entry in the state history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVisit {
    /// State entered.
    pub state: PipelineState,
    /// Milliseconds since the run started.
    pub at_ms: u64,
}

/// Current state plus every state entered so far.
#[derive(Debug, Clone)]
pub struct StateTracker {
    started: Instant,
    history: Vec<StateVisit>,
}

impl StateTracker {
    /// Starts in [`PipelineState::PersonaSelect`].
    #[must_use]
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            history: vec![StateVisit {
                state: PipelineState::PersonaSelect,
                at_ms: 0,
            }],
        }
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> PipelineState {
        self.history
            .last()
            .map_or(PipelineState::PersonaSelect, |v| v.state)
    }

    /// Enters `next`. An illegal transition is logged and recorded anyway so
    /// the history shows what actually happened.
    pub fn advance(&mut self, next: PipelineState) {
        let current = self.current();
        if !current.can_transition(next) {
            tracing::warn!(from = ?current, to = ?next, "unexpected pipeline transition");
        }
        let at_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(state = ?next, at_ms, "pipeline state");
        self.history.push(StateVisit { state: next, at_ms });
    }

    /// Every state entered, in order.
    #[must_use]
    pub fn history(&self) -> &[StateVisit] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineState::*;
    use test_case::test_case;

    #[test_case(PersonaSelect, SubQueryGen, true)]
    #[test_case(AssembleContext, Assemble, true)]
    #[test_case(RagSectionDraft, Assemble, true)]
    #[test_case(Retrieve, Aborted, true)]
    #[test_case(Aborted, Assemble, false)]
    #[test_case(Retrieve, Synthesize, false)]
    #[test_case(Done, Aborted, false)]
    fn test_transitions(from: PipelineState, to: PipelineState, allowed: bool) {
        assert_eq!(from.can_transition(to), allowed);
    }

    #[test]
    fn test_tracker_records_history() {
        let mut tracker = StateTracker::new(Instant::now());
        tracker.advance(SubQueryGen);
        tracker.advance(Retrieve);
        assert_eq!(tracker.current(), Retrieve);
        let states: Vec<_> = tracker.history().iter().map(|v| v.state).collect();
        assert_eq!(states, vec![PersonaSelect, SubQueryGen, Retrieve]);
    }
}
