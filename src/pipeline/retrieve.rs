//! The Retrieve stage: one concurrent iteration per sub-query.
//!
//! Each iteration reserves web calls on the plan, builds its retrievers,
//! and collects sources under the per-iteration timeout. Results come back
//! in dispatch order no matter which iteration finishes first.
//!
//! URLs shared between sub-queries belong to the lowest dispatch index that
//! finished. A timed-out iteration gives its claims back, and ownership is
//! settled in dispatch order once every iteration ended.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use tokio::sync::Semaphore;

use crate::curation::{Collected, Collector, VisitedUrls};
use crate::error::PlannerError;
use crate::planner::{ResearchPlan, StepStatus, WEB_CALLS};
use crate::retriever::{Retriever, RetrieverOptions, RetrieverRegistry};

/// Shared inputs for every iteration of one run.
#[derive(Clone)]
pub struct RetrievalPlan {
    /// Retriever identifiers to run per sub-query.
    pub retrievers: Arc<Vec<String>>,
    /// Registry the identifiers resolve against.
    pub registry: Arc<RetrieverRegistry>,
    /// Options handed to every retriever.
    pub options: Arc<RetrieverOptions>,
    /// Searches and scrapes.
    pub collector: Arc<Collector>,
    /// Concurrent iterations.
    pub max_concurrent: usize,
    /// Per-iteration timeout.
    pub timeout: Duration,
    /// Whether budget limits refuse iterations.
    pub enforce_budget: bool,
}

/// How one iteration ended.
#[derive(Debug)]
pub struct IterationResult {
    /// Dispatch index.
    pub index: usize,
    /// The sub-query.
    pub sub_query: String,
    /// Final step status.
    pub status: StepStatus,
    /// Collected sources; `None` unless the iteration completed.
    pub collected: Option<Collected>,
    /// Failure or skip reason.
    pub error: Option<String>,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

impl IterationResult {
    fn ended(index: usize, sub_query: &str, status: StepStatus, error: String, started: Instant) -> Self {
        Self {
            index,
            sub_query: sub_query.to_string(),
            status,
            collected: None,
            error: Some(error),
            elapsed: started.elapsed(),
        }
    }
}

fn build_retrievers(plan: &RetrievalPlan, sub_query: &str) -> (Vec<Box<dyn Retriever>>, Vec<String>) {
    let mut built = Vec::with_capacity(plan.retrievers.len());
    let mut errors = Vec::new();
    for name in plan.retrievers.iter() {
        match plan.registry.create(name, sub_query, &plan.options) {
            Ok(retriever) => built.push(retriever),
            Err(e) => {
                tracing::warn!(retriever = %name, error = %e, "retriever unavailable for sub-query");
                errors.push(e.to_string());
            }
        }
    }
    (built, errors)
}

async fn run_iteration(
    index: usize,
    sub_query: String,
    plan: RetrievalPlan,
    ledger: Arc<ResearchPlan>,
    visited: Arc<VisitedUrls>,
    semaphore: Arc<Semaphore>,
) -> Result<IterationResult, PlannerError> {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return Ok(IterationResult::ended(
            index,
            &sub_query,
            StepStatus::Failed,
            "iteration pool closed".to_string(),
            Instant::now(),
        ));
    };
    let started = Instant::now();

    #[allow(clippy::cast_precision_loss)]
    let calls = plan.retrievers.len() as f64;
    if !ledger.try_reserve(WEB_CALLS, calls, plan.enforce_budget)? {
        tracing::info!(index, sub_query = %sub_query, "iteration skipped, budget exhausted");
        return Ok(IterationResult::ended(
            index,
            &sub_query,
            StepStatus::Skipped,
            "budget exhausted".to_string(),
            started,
        ));
    }
    ledger.update_step(&sub_query, StepStatus::Running, None);

    let (retrievers, errors) = build_retrievers(&plan, &sub_query);
    if retrievers.is_empty() {
        return Ok(IterationResult::ended(
            index,
            &sub_query,
            StepStatus::Failed,
            format!("no retriever available: {}", errors.join("; ")),
            started,
        ));
    }

    let collect = plan.collector.collect(index, &retrievers, &visited);
    match tokio::time::timeout(plan.timeout, collect).await {
        Ok(collected) => Ok(IterationResult {
            index,
            sub_query,
            status: StepStatus::Done,
            collected: Some(collected),
            error: None,
            elapsed: started.elapsed(),
        }),
        Err(_) => {
            let released = visited.release(index);
            tracing::warn!(
                index,
                sub_query = %sub_query,
                timeout_secs = plan.timeout.as_secs(),
                released,
                "iteration timed out"
            );
            Ok(IterationResult::ended(
                index,
                &sub_query,
                StepStatus::Failed,
                format!("timed out after {}s", plan.timeout.as_secs()),
                started,
            ))
        }
    }
}

fn step_metadata(result: &IterationResult) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert(
        "elapsed_ms".to_string(),
        json!(u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX)),
    );
    if let Some(collected) = &result.collected {
        meta.insert("retrieved".to_string(), json!(collected.retrieved));
        meta.insert("duplicates".to_string(), json!(collected.duplicates));
        meta.insert("sources".to_string(), json!(collected.sources.len()));
    }
    if let Some(error) = &result.error {
        meta.insert("error".to_string(), json!(error));
    }
    meta
}

/// Runs one iteration per sub-query with bounded concurrency and records
/// each step's final status on the plan.
///
/// # Errors
///
/// Returns [`PlannerError`] only if the ledger rejects a reservation
/// amount, which indicates a bug rather than a budget condition.
pub async fn retrieve_all(
    sub_queries: &[String],
    plan: &RetrievalPlan,
    ledger: &Arc<ResearchPlan>,
    visited: &Arc<VisitedUrls>,
) -> Result<Vec<IterationResult>, PlannerError> {
    let semaphore = Arc::new(Semaphore::new(plan.max_concurrent.max(1)));
    let handles: Vec<_> = sub_queries
        .iter()
        .enumerate()
        .map(|(index, sub_query)| {
            tokio::spawn(run_iteration(
                index,
                sub_query.clone(),
                plan.clone(),
                Arc::clone(ledger),
                Arc::clone(visited),
                Arc::clone(&semaphore),
            ))
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(result) => result?,
            Err(e) => IterationResult::ended(
                index,
                &sub_queries[index],
                StepStatus::Failed,
                format!("iteration task failed: {e}"),
                Instant::now(),
            ),
        };
        results.push(result);
    }

    settle_ownership(&mut results, plan, visited).await;
    for result in &results {
        ledger.update_step(&result.sub_query, result.status, Some(step_metadata(result)));
    }
    Ok(results)
}

async fn settle_ownership(results: &mut [IterationResult], plan: &RetrievalPlan, visited: &VisitedUrls) {
    for result in results.iter().filter(|r| r.collected.is_none()) {
        visited.release(result.index);
    }
    for result in results.iter_mut() {
        if let Some(collected) = result.collected.as_mut() {
            plan.collector
                .settle(collected, result.index, visited, plan.timeout)
                .await;
        }
    }
}

impl std::fmt::Debug for RetrievalPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalPlan")
            .field("retrievers", &self.retrievers)
            .field("max_concurrent", &self.max_concurrent)
            .field("timeout", &self.timeout)
            .field("enforce_budget", &self.enforce_budget)
            .finish_non_exhaustive()
    }
}
