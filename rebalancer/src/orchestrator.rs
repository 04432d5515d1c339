//! The rebalancing engine's front door.
//!
//! [`RebalanceOrchestrator`] is built from injected ports (market data,
//! broker, store) and a config. It holds no global state and is
//! `Send + Sync`, so one instance can be shared behind an `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use driftbook::{
    AllocationAnalyzer, AllocationSnapshot, EvaluationContext, MarketDataPort, Portfolio,
    RebalanceRecommendation, RebalancingStrategy, ValidationError, estimate_impact, evaluate,
    optimize_trades,
};
use driftbook_broker::BrokerPort;
use log::{debug, info, warn};

use crate::audit::{self, AuditLog};
use crate::cancel::CancellationToken;
use crate::config::{EngineConfig, MarketSession};
use crate::error::{Error, Result};
use crate::execution::{
    ExecutionEngine, ExecutionStatus, RebalanceExecution, TradeExecution, priority_order,
};
use crate::lock::{Phase, PortfolioLocks};
use crate::reconcile::{DeviationReport, deviation_report};
use crate::store::{PortfolioStore, StoreError};

/// Which strategies `analyze` runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategySelection {
    /// Every enabled strategy; invalid ones are skipped with a warning.
    All,
    /// One strategy by id or name.
    Named(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub dry_run: bool,
}

pub struct RebalanceOrchestrator {
    market: Arc<dyn MarketDataPort + Send + Sync>,
    broker: Arc<dyn BrokerPort + Send + Sync>,
    store: Arc<dyn PortfolioStore + Send + Sync>,
    config: EngineConfig,
    session: MarketSession,
    audit: Option<Mutex<AuditLog>>,
    locks: PortfolioLocks,
    counter: AtomicU64,
}

impl RebalanceOrchestrator {
    /// Build an orchestrator over the given ports.
    ///
    /// Fails with [`Error::Config`] if `config` does not validate.
    pub fn new(
        market: Arc<dyn MarketDataPort + Send + Sync>,
        broker: Arc<dyn BrokerPort + Send + Sync>,
        store: Arc<dyn PortfolioStore + Send + Sync>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let session = config.market_hours.session()?;
        Ok(Self {
            market,
            broker,
            store,
            config,
            session,
            audit: None,
            locks: PortfolioLocks::new(),
            counter: AtomicU64::new(0),
        })
    }

    /// Append analysis and execution events to `audit`.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(Mutex::new(audit));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// What the engine is currently doing with `portfolio_id`.
    pub fn phase(&self, portfolio_id: &str) -> Phase {
        self.locks.phase(portfolio_id)
    }

    /// Current weights against targets for one portfolio.
    pub fn drift(&self, portfolio_id: &str) -> Result<DeviationReport> {
        let _analysis = self.locks.begin_analysis(portfolio_id);
        let portfolio = self.load_portfolio(portfolio_id)?;
        Ok(deviation_report(&self.snapshot(&portfolio)))
    }

    /// Evaluate strategies for `portfolio_id` as of now.
    pub fn analyze(
        &self,
        portfolio_id: &str,
        selection: &StrategySelection,
    ) -> Result<Vec<RebalanceRecommendation>> {
        self.analyze_at(portfolio_id, selection, Utc::now())
    }

    /// Evaluate strategies for `portfolio_id` as of `now`.
    ///
    /// Returns only recommendations with at least one trade, most urgent
    /// first. Never touches the broker or writes to the store.
    pub fn analyze_at(
        &self,
        portfolio_id: &str,
        selection: &StrategySelection,
        now: DateTime<Utc>,
    ) -> Result<Vec<RebalanceRecommendation>> {
        let _analysis = self.locks.begin_analysis(portfolio_id);
        let portfolio = self.load_portfolio(portfolio_id)?;
        portfolio.validate()?;
        let strategies = self.select_strategies(portfolio_id, selection)?;

        let snapshot = self.snapshot(&portfolio);
        let pricing = self.config.pricing();

        let mut recommendations = Vec::new();
        for strategy in &strategies {
            let ctx = EvaluationContext {
                snapshot: &snapshot,
                strategy,
                pricing: &pricing,
                now,
            };
            let evaluation = evaluate(&ctx);
            let trades = optimize_trades(evaluation.trades, strategy, &pricing);
            if trades.is_empty() {
                debug!("{}: {} ({})", portfolio_id, strategy.id, evaluation.reason);
                continue;
            }

            let estimated_impact =
                estimate_impact(&trades, snapshot.total_value_cents(), &strategy.params.impact);
            recommendations.push(RebalanceRecommendation {
                portfolio_id: portfolio_id.to_string(),
                strategy_id: strategy.id.clone(),
                strategy_name: strategy.name.clone(),
                reason: evaluation.reason,
                urgency: evaluation.urgency,
                estimated_impact,
                total_trade_value_cents: trades.iter().map(|t| t.notional_cents).sum(),
                trades,
                market_hours_only: strategy.constraints.market_hours_only,
                created_at: now,
            });
        }

        recommendations.sort_by(|a, b| b.urgency.cmp(&a.urgency));
        info!(
            "analyzed {}: {} strategy(ies), {} recommendation(s)",
            portfolio_id,
            strategies.len(),
            recommendations.len()
        );
        self.audit(|log| audit::log_analysis_completed(log, portfolio_id, &recommendations));
        Ok(recommendations)
    }

    /// Execute a recommendation now.
    pub fn execute(
        &self,
        recommendation: RebalanceRecommendation,
        options: ExecuteOptions,
        cancel: &CancellationToken,
    ) -> Result<RebalanceExecution> {
        self.execute_at(recommendation, options, cancel, Utc::now())
    }

    /// Execute a recommendation, checking market hours against `now`.
    ///
    /// Returns `Err` only for validation failures and for a concurrent
    /// execution on the same portfolio. Every other outcome, including
    /// systemic failure, is an `Ok` execution with the matching status.
    pub fn execute_at(
        &self,
        recommendation: RebalanceRecommendation,
        options: ExecuteOptions,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> Result<RebalanceExecution> {
        self.validate_recommendation(&recommendation, now)?;

        let portfolio_id = recommendation.portfolio_id.clone();
        let Some(_guard) = self.locks.try_execute(&portfolio_id) else {
            warn!("rejecting execute for {portfolio_id}: already executing");
            return Err(Error::ConcurrentExecution(portfolio_id));
        };

        let id = self.next_id(&portfolio_id);
        info!(
            "execution {id}: strategy {} with {} trade(s){}",
            recommendation.strategy_id,
            recommendation.trades.len(),
            if options.dry_run { " (dry run)" } else { "" }
        );
        self.audit(|log| audit::log_execution_started(log, &id, &recommendation, options.dry_run));

        let execution = if options.dry_run {
            self.simulate(id, &recommendation)
        } else {
            self.run_live(id, &recommendation, cancel)
        };

        self.audit(|log| audit::log_execution_finished(log, &execution));
        Ok(execution)
    }

    fn validate_recommendation(
        &self,
        recommendation: &RebalanceRecommendation,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if recommendation.trades.is_empty() {
            return Err(ValidationError::EmptyRecommendation(recommendation.portfolio_id.clone()).into());
        }
        for trade in &recommendation.trades {
            if !(trade.shares.is_finite() && trade.shares > 0.0) {
                return Err(ValidationError::InvalidTrade {
                    symbol: trade.symbol,
                    shares: trade.shares,
                }
                .into());
            }
        }
        if recommendation.market_hours_only && !self.session.contains(now) {
            return Err(ValidationError::MarketClosed.into());
        }
        Ok(())
    }

    /// Dry run: simulated fills at the reference price, no broker calls.
    fn simulate(&self, id: String, recommendation: &RebalanceRecommendation) -> RebalanceExecution {
        let mut execution = RebalanceExecution::pending(id, recommendation, true);
        execution.status = ExecutionStatus::Executing;
        let cost_model = self.config.cost_model();
        for (i, trade) in priority_order(&recommendation.trades).into_iter().enumerate() {
            let record = TradeExecution::simulated(trade, format!("dry-run-{}", i + 1), &cost_model);
            self.audit(|log| audit::log_trade_attempted(log, &execution.id, &record));
            execution.trades.push(record);
        }
        execution.finish(ExecutionStatus::Completed, recommendation.trades.len());
        execution.results.improvement_score = self.config.dry_run.improvement_score;

        match self.store.load_portfolio(&recommendation.portfolio_id) {
            Ok(portfolio) => {
                execution.results.target_deviation = self.deviation_after(portfolio, &execution.trades);
            }
            Err(e) => debug!("dry run {}: no deviation estimate ({e})", execution.id),
        }
        info!(
            "dry run {} simulated {} trade(s)",
            execution.id,
            execution.trades.len()
        );
        execution
    }

    fn run_live(
        &self,
        id: String,
        recommendation: &RebalanceRecommendation,
        cancel: &CancellationToken,
    ) -> RebalanceExecution {
        let portfolio = match self.store.load_portfolio(&recommendation.portfolio_id) {
            Ok(p) => p,
            Err(e) => {
                let mut execution = RebalanceExecution::pending(id, recommendation, false);
                execution.fail_systemic(format!("failed to load portfolio: {e}"));
                self.persist(&mut execution);
                return execution;
            }
        };

        let engine = ExecutionEngine::new(
            &*self.broker,
            &self.config.execution,
            self.config.cost_model(),
        );
        let mut execution = engine.run(id, recommendation, cancel);
        for trade in &execution.trades {
            self.audit(|log| audit::log_trade_attempted(log, &execution.id, trade));
        }

        execution.results.target_deviation = self.deviation_after(portfolio, &execution.trades);
        self.persist(&mut execution);
        execution
    }

    /// Mean absolute drift once `trades` are applied to `portfolio`.
    fn deviation_after(&self, mut portfolio: Portfolio, trades: &[TradeExecution]) -> f64 {
        for trade in trades {
            if let Some(price) = trade.avg_fill_price_cents {
                portfolio.apply_fill(
                    &trade.symbol,
                    trade.action,
                    trade.filled_shares,
                    price,
                    trade.total_cost_cents,
                );
            }
        }
        deviation_report(&self.snapshot(&portfolio)).mean_abs_drift
    }

    fn persist(&self, execution: &mut RebalanceExecution) {
        if let Err(e) = self.store.save_execution(execution) {
            warn!("execution {}: not saved: {e}", execution.id);
            execution.errors.push(format!("failed to save execution: {e}"));
        }
    }

    fn snapshot(&self, portfolio: &Portfolio) -> AllocationSnapshot {
        AllocationAnalyzer::new(&*self.market).analyze(portfolio)
    }

    fn load_portfolio(&self, portfolio_id: &str) -> Result<Portfolio> {
        self.store.load_portfolio(portfolio_id).map_err(|e| match e {
            StoreError::NotFound(id) => Error::Validation(ValidationError::UnknownPortfolio(id)),
            other => Error::Store(other),
        })
    }

    fn select_strategies(
        &self,
        portfolio_id: &str,
        selection: &StrategySelection,
    ) -> Result<Vec<RebalancingStrategy>> {
        let strategies = self.store.load_strategies(portfolio_id)?;
        match selection {
            StrategySelection::All => Ok(strategies
                .into_iter()
                .filter(|s| s.enabled)
                .filter(|s| match s.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("{portfolio_id}: skipping strategy {}: {e}", s.id);
                        false
                    }
                })
                .collect()),
            StrategySelection::Named(key) => {
                let strategy = strategies
                    .into_iter()
                    .find(|s| s.matches(key))
                    .ok_or_else(|| ValidationError::UnknownStrategy(key.clone()))?;
                if !strategy.enabled {
                    return Err(ValidationError::StrategyDisabled(strategy.id).into());
                }
                strategy.validate()?;
                Ok(vec![strategy])
            }
        }
    }

    fn next_id(&self, portfolio_id: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("exec-{portfolio_id}-{}-{n}", Utc::now().timestamp_millis())
    }

    /// Run `f` against the audit log, if any. Failures are logged, never fatal.
    fn audit(&self, f: impl FnOnce(&mut AuditLog) -> Result<()>) {
        if let Some(audit) = &self.audit {
            let mut log = audit.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = f(&mut log) {
                warn!("audit write failed: {e}");
            }
        }
    }
}
