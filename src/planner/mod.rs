//! Research planner: the run's step list and resource budgets.
//!
//! The plan is a passive ledger. It never decides anything on its own;
//! the pipeline consults [`ResearchPlan::should_halt`] before expensive
//! stages and records usage as work completes. All operations take `&self`
//! and lock internally, so one plan can be shared across concurrently
//! dispatched sub-query tasks behind an `Arc`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PlannerError;

/// Budget name for total LLM tokens.
pub const TOKENS: &str = "tokens";
/// Budget name for retriever searches.
pub const WEB_CALLS: &str = "web_calls";
/// Budget name for monetary cost in USD.
pub const COST: &str = "cost";

/// Lifecycle of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Planned, not started.
    Pending,
    /// Retrieval in flight.
    Running,
    /// Finished successfully.
    Done,
    /// Finished with an error or timeout.
    Failed,
    /// Never started because the budget was exhausted.
    Skipped,
}

/// One planned sub-query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// The sub-query text.
    pub sub_query: String,
    /// Why the step exists.
    pub rationale: String,
    /// Current status.
    pub status: StepStatus,
    /// Free-form metadata merged in by `update_step`.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Optional ceilings for the built-in budgets. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetLimits {
    /// Token ceiling.
    pub tokens: Option<f64>,
    /// Retriever search ceiling.
    pub web_calls: Option<f64>,
    /// Cost ceiling in USD.
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Budget {
    limit: Option<f64>,
    used: f64,
}

impl Budget {
    fn exhausted(self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }
}

/// Snapshot of one budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetTrace {
    /// Ceiling, `None` when unlimited.
    pub limit: Option<f64>,
    /// Amount used so far.
    pub used: f64,
    /// `max(limit - used, 0)`, or `None` when unlimited.
    pub remaining: Option<f64>,
    /// Whether `used >= limit`.
    pub exhausted: bool,
}

/// Read-only snapshot of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTrace {
    /// The original query.
    pub query: String,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Steps in insertion order.
    pub steps: Vec<PlanStep>,
    /// Budgets keyed by name.
    pub budgets: BTreeMap<String, BudgetTrace>,
}

#[derive(Debug, Default)]
struct PlanState {
    steps: Vec<PlanStep>,
    budgets: BTreeMap<String, Budget>,
}

/// Step list and budget ledger for one research run.
#[derive(Debug)]
pub struct ResearchPlan {
    query: String,
    created_at: DateTime<Utc>,
    state: Mutex<PlanState>,
}

impl ResearchPlan {
    /// Creates a plan with zero usage and the given limits. No steps yet.
    #[must_use]
    pub fn new(query: impl Into<String>, limits: BudgetLimits) -> Self {
        let mut budgets = BTreeMap::new();
        for (name, limit) in [
            (TOKENS, limits.tokens),
            (WEB_CALLS, limits.web_calls),
            (COST, limits.cost),
        ] {
            budgets.insert(name.to_string(), Budget { limit, used: 0.0 });
        }
        Self {
            query: query.into(),
            created_at: Utc::now(),
            state: Mutex::new(PlanState {
                steps: Vec::new(),
                budgets,
            }),
        }
    }

    /// The query this plan was created for.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    fn lock(&self) -> MutexGuard<'_, PlanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a pending step. Duplicate sub-queries are kept.
    pub fn add_step(&self, sub_query: impl Into<String>, rationale: impl Into<String>) -> PlanStep {
        let step = PlanStep {
            sub_query: sub_query.into(),
            rationale: rationale.into(),
            status: StepStatus::Pending,
            metadata: Map::new(),
        };
        self.lock().steps.push(step.clone());
        step
    }

    /// Updates the first step whose sub-query matches and merges `metadata`
    /// into it. A missing step is ignored.
    pub fn update_step(&self, sub_query: &str, status: StepStatus, metadata: Option<Map<String, Value>>) {
        let mut state = self.lock();
        let Some(step) = state.steps.iter_mut().find(|s| s.sub_query == sub_query) else {
            tracing::warn!(sub_query, ?status, "update_step on unknown sub-query ignored");
            return;
        };
        step.status = status;
        if let Some(meta) = metadata {
            step.metadata.extend(meta);
        }
    }

    /// Adds `amount` to a budget's used counter, creating an unlimited
    /// budget for unknown names.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::InvalidUsage`] for negative or NaN amounts;
    /// state is left untouched.
    pub fn record_usage(&self, name: &str, amount: f64) -> Result<(), PlannerError> {
        validate_amount(name, amount)?;
        let mut state = self.lock();
        record(&mut state, name, amount);
        Ok(())
    }

    /// Whether an enforced budget is exhausted. Always `false` when
    /// `enforce` is `false`.
    #[must_use]
    pub fn should_halt(&self, enforce: bool) -> bool {
        enforce && halted(&self.lock())
    }

    /// Checks the halt signal and records usage under one lock.
    ///
    /// Returns `Ok(false)` without recording when `enforce` is set and a
    /// budget is already exhausted. Concurrent callers therefore never
    /// overshoot a ceiling by more than one reservation.
    ///
    /// # Errors
    ///
    /// Returns [`PlannerError::InvalidUsage`] for negative or NaN amounts.
    pub fn try_reserve(&self, name: &str, amount: f64, enforce: bool) -> Result<bool, PlannerError> {
        validate_amount(name, amount)?;
        let mut state = self.lock();
        if enforce && halted(&state) {
            return Ok(false);
        }
        record(&mut state, name, amount);
        Ok(true)
    }

    /// Amount used on a budget, `0.0` for unknown names.
    #[must_use]
    pub fn used(&self, name: &str) -> f64 {
        self.lock().budgets.get(name).map_or(0.0, |b| b.used)
    }

    /// Names of budgets that are exhausted.
    #[must_use]
    pub fn exhausted_budgets(&self) -> Vec<String> {
        self.lock()
            .budgets
            .iter()
            .filter(|(_, b)| b.exhausted())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Snapshot of the plan.
    #[must_use]
    pub fn trace(&self) -> PlanTrace {
        let state = self.lock();
        let budgets = state
            .budgets
            .iter()
            .map(|(name, b)| {
                let trace = BudgetTrace {
                    limit: b.limit,
                    used: b.used,
                    remaining: b.limit.map(|limit| (limit - b.used).max(0.0)),
                    exhausted: b.exhausted(),
                };
                (name.clone(), trace)
            })
            .collect();
        PlanTrace {
            query: self.query.clone(),
            created_at: self.created_at,
            steps: state.steps.clone(),
            budgets,
        }
    }
}

fn validate_amount(name: &str, amount: f64) -> Result<(), PlannerError> {
    if amount.is_nan() || amount < 0.0 {
        return Err(PlannerError::InvalidUsage {
            budget: name.to_string(),
            amount,
        });
    }
    Ok(())
}

fn record(state: &mut PlanState, name: &str, amount: f64) {
    let budget = state.budgets.entry(name.to_string()).or_default();
    budget.used += amount;
    if budget.exhausted() {
        tracing::debug!(budget = name, used = budget.used, limit = ?budget.limit, "budget exhausted");
    }
}

fn halted(state: &PlanState) -> bool {
    state.budgets.values().any(|b| b.exhausted())
}
