//! Per-portfolio execution locks and phase tracking.
//!
//! At most one execution runs per portfolio. A second `execute` is rejected
//! immediately instead of waiting. Analyses never take the execution lock;
//! they only register themselves so [`PortfolioLocks::phase`] can report them.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::FxHashMap;

/// What the engine is doing with a portfolio right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Analyzing,
    Executing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Analyzing => "analyzing",
            Phase::Executing => "executing",
        };
        f.pad(s)
    }
}

#[derive(Default)]
struct Activity {
    executing: bool,
    analyses: usize,
}

/// Registry of per-portfolio activity.
#[derive(Default)]
pub struct PortfolioLocks {
    inner: Mutex<FxHashMap<String, Activity>>,
}

impl PortfolioLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the execution lock; `None` if one is already held.
    pub fn try_execute(&self, portfolio_id: &str) -> Option<ExecutionGuard<'_>> {
        let mut map = self.map();
        let activity = map.entry(portfolio_id.to_string()).or_default();
        if activity.executing {
            return None;
        }
        activity.executing = true;
        Some(ExecutionGuard {
            locks: self,
            portfolio_id: portfolio_id.to_string(),
        })
    }

    /// Register a running analysis until the guard drops.
    pub fn begin_analysis(&self, portfolio_id: &str) -> AnalysisGuard<'_> {
        self.map()
            .entry(portfolio_id.to_string())
            .or_default()
            .analyses += 1;
        AnalysisGuard {
            locks: self,
            portfolio_id: portfolio_id.to_string(),
        }
    }

    pub fn phase(&self, portfolio_id: &str) -> Phase {
        match self.map().get(portfolio_id) {
            Some(a) if a.executing => Phase::Executing,
            Some(a) if a.analyses > 0 => Phase::Analyzing,
            _ => Phase::Idle,
        }
    }

    fn map(&self) -> MutexGuard<'_, FxHashMap<String, Activity>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, portfolio_id: &str, execution: bool) {
        let mut map = self.map();
        if let Some(activity) = map.get_mut(portfolio_id) {
            if execution {
                activity.executing = false;
            } else {
                activity.analyses = activity.analyses.saturating_sub(1);
            }
            if !activity.executing && activity.analyses == 0 {
                map.remove(portfolio_id);
            }
        }
    }
}

/// Held for the duration of one execution.
pub struct ExecutionGuard<'a> {
    locks: &'a PortfolioLocks,
    portfolio_id: String,
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.portfolio_id, true);
    }
}

/// Held for the duration of one analysis.
pub struct AnalysisGuard<'a> {
    locks: &'a PortfolioLocks,
    portfolio_id: String,
}

impl Drop for AnalysisGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.portfolio_id, false);
    }
}
