//! Persistence port for portfolios, strategies, and execution records.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use driftbook::{Portfolio, RebalancingStrategy};
use rustc_hash::FxHashMap;

use crate::execution::RebalanceExecution;

/// Errors returned by a [`PortfolioStore`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("portfolio '{0}' not found")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Where portfolios and strategies come from and executions go.
///
/// Implementations may block. The engine never writes portfolios or
/// strategies back; it only appends executions.
pub trait PortfolioStore {
    fn load_portfolio(&self, id: &str) -> Result<Portfolio, StoreError>;

    /// All strategies configured for a portfolio, enabled or not.
    fn load_strategies(&self, portfolio_id: &str) -> Result<Vec<RebalancingStrategy>, StoreError>;

    fn save_execution(&self, execution: &RebalanceExecution) -> Result<(), StoreError>;
}

#[derive(Default)]
struct Tables {
    portfolios: FxHashMap<String, Portfolio>,
    strategies: FxHashMap<String, Vec<RebalancingStrategy>>,
    executions: Vec<RebalanceExecution>,
}

/// In-memory store for tests and the CLI.
///
/// [`set_offline`](Self::set_offline) makes every call fail with
/// `Unavailable`, to exercise outage handling.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    offline: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_portfolio(self, portfolio: Portfolio) -> Self {
        self.put_portfolio(portfolio);
        self
    }

    pub fn with_strategy(self, portfolio_id: &str, strategy: RebalancingStrategy) -> Self {
        self.tables()
            .strategies
            .entry(portfolio_id.to_string())
            .or_default()
            .push(strategy);
        self
    }

    pub fn put_portfolio(&self, portfolio: Portfolio) {
        self.tables()
            .portfolios
            .insert(portfolio.id.clone(), portfolio);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Executions saved so far, oldest first.
    pub fn executions(&self) -> Vec<RebalanceExecution> {
        self.tables().executions.clone()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

impl PortfolioStore for InMemoryStore {
    fn load_portfolio(&self, id: &str) -> Result<Portfolio, StoreError> {
        self.check_online()?;
        self.tables()
            .portfolios
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn load_strategies(&self, portfolio_id: &str) -> Result<Vec<RebalancingStrategy>, StoreError> {
        self.check_online()?;
        Ok(self
            .tables()
            .strategies
            .get(portfolio_id)
            .cloned()
            .unwrap_or_default())
    }

    fn save_execution(&self, execution: &RebalanceExecution) -> Result<(), StoreError> {
        self.check_online()?;
        self.tables().executions.push(execution.clone());
        Ok(())
    }
}
