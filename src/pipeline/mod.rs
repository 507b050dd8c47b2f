//! The report synthesis pipeline.
//!
//! A run moves through [`PipelineState`]s from persona selection to a
//! terminal `Done` or `Aborted`, owning a fresh [`RunContext`] throughout.
//! Sub-query iterations run concurrently in the Retrieve stage; sections of
//! long reports are drafted concurrently over context narrowed by a vector
//! store. Every LLM call degrades on failure, and an exhausted budget skips
//! straight to assembly with whatever has been gathered.

pub mod outcome;
pub mod researcher;
pub mod retrieve;
pub mod run;
pub mod sink;
pub mod state;
pub mod synthesis;

pub use outcome::{RejectedSource, ResearchOutcome};
pub use researcher::{MAX_QUERY_LEN, Researcher, ResearcherBuilder, validate_query};
pub use retrieve::{IterationResult, RetrievalPlan, retrieve_all};
pub use run::RunContext;
pub use sink::{ChannelSink, EventKind, ProgressEvent, ProgressSink, TracingSink};
pub use state::{PipelineState, StateTracker, StateVisit};
pub use synthesis::{ReportParts, Synthesizer, assemble};
