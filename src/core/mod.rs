//! Core data model shared by every pipeline stage.

pub mod query;
pub mod relevance;
pub mod report;
pub mod source;

pub use query::{Query, ReportSource, ReportType, Tone};
pub use relevance::Relevance;
pub use report::{Report, ReportHeaders, ReportSection, SourceCitation};
pub use source::{CurationStage, RetrievalResult, ScoreKind, SourceRecord, SourceScores};
