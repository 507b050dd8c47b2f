//! Per-sub-query research iterations and their merge into one context.

use serde::{Deserialize, Serialize};

/// Outcome metadata for one research iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Dispatch index of the sub-query.
    pub index: usize,
    /// The sub-query text.
    pub sub_query: String,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Whether the iteration produced usable context.
    pub success: bool,
    /// Failure reason (error text or timeout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Curated sources the iteration contributed.
    pub sources: usize,
}

/// One iteration's record plus the context it gathered.
#[derive(Debug, Clone)]
pub struct Iteration {
    /// Metadata kept for reporting.
    pub record: IterationRecord,
    /// Source texts in retrieval order.
    pub context: Vec<String>,
}

/// Merges the context of successful iterations in dispatch order.
///
/// Failed iterations contribute nothing even if they carry partial
/// context; their records are still kept by the caller.
#[must_use]
pub fn merge_iterations(iterations: &[Iteration]) -> String {
    let mut ordered: Vec<&Iteration> = iterations.iter().filter(|i| i.record.success).collect();
    ordered.sort_by_key(|i| i.record.index);
    let texts: Vec<&str> = ordered
        .iter()
        .flat_map(|i| i.context.iter().map(String::as_str))
        .collect();
    super::combine(&texts)
}
