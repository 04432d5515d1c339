//! Execution engine: submit a recommendation's trades one by one.
//!
//! Trades run strictly in descending priority, whatever order they arrive in.
//! Each order is placed, then polled until the broker reports a terminal
//! state. A failed trade is recorded and the batch continues; only
//! cancellation stops it early.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use driftbook::{CostModel, RebalanceRecommendation, Symbol, TradeAction, TradeRecommendation};
use driftbook_broker::{
    BrokerError, BrokerOrder, BrokerOrderType, BrokerPort, BrokerSide, OrderAck, OrderState,
};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::cancel::CancellationToken;
use crate::config::{ExecutionConfig, OrderTypeSetting};

/// Shares below this are treated as nothing filled.
const FILL_EPSILON: f64 = 1e-9;

/// Lifecycle of a whole execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Outcome of one attempted trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Filled,
    Partial,
    Cancelled,
    Failed,
}

impl TradeStatus {
    /// Filled or partially filled.
    pub fn is_executed(self) -> bool {
        matches!(self, TradeStatus::Filled | TradeStatus::Partial)
    }
}

/// Record of one attempted trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeExecution {
    pub symbol: Symbol,
    pub action: TradeAction,
    pub order_id: Option<String>,
    pub status: TradeStatus,
    pub requested_shares: f64,
    pub filled_shares: f64,
    pub avg_fill_price_cents: Option<i64>,
    pub total_cost_cents: i64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl TradeExecution {
    fn pending(trade: &TradeRecommendation) -> Self {
        Self {
            symbol: trade.symbol,
            action: trade.action,
            order_id: None,
            status: TradeStatus::Pending,
            requested_shares: trade.shares,
            filled_shares: 0.0,
            avg_fill_price_cents: None,
            total_cost_cents: 0,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// A simulated fill at the reference price.
    pub(crate) fn simulated(trade: &TradeRecommendation, order_id: String, cost_model: &CostModel) -> Self {
        Self {
            order_id: Some(order_id),
            status: TradeStatus::Filled,
            filled_shares: trade.shares,
            avg_fill_price_cents: Some(trade.price_cents),
            total_cost_cents: cost_model.compute_cost(trade.notional_cents),
            ..Self::pending(trade)
        }
    }

    fn fail(&mut self, message: String) {
        self.status = TradeStatus::Failed;
        self.error = Some(message);
    }

    /// Value of the filled shares at the fill price (cents).
    pub fn filled_notional_cents(&self) -> i64 {
        match self.avg_fill_price_cents {
            Some(price) => (self.filled_shares * price as f64).round() as i64,
            None => 0,
        }
    }
}

/// Summary figures for a finished execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResults {
    /// Filled plus partially filled trades.
    pub trades_executed: usize,
    pub trades_failed: usize,
    pub total_cost_cents: i64,
    /// Mean absolute drift after the fills were applied (percentage points).
    pub target_deviation: f64,
    /// Executed trades as a percentage of recommended trades.
    pub improvement_score: f64,
}

/// A recommendation's journey through the broker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceExecution {
    pub id: String,
    pub portfolio_id: String,
    pub strategy_id: String,
    pub status: ExecutionStatus,
    pub dry_run: bool,
    pub trades: Vec<TradeExecution>,
    /// Value traded (cents), at fill prices.
    pub total_value_cents: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
    pub results: ExecutionResults,
}

impl RebalanceExecution {
    /// A fresh, pending execution for `recommendation`.
    pub fn pending(id: String, recommendation: &RebalanceRecommendation, dry_run: bool) -> Self {
        Self {
            id,
            portfolio_id: recommendation.portfolio_id.clone(),
            strategy_id: recommendation.strategy_id.clone(),
            status: ExecutionStatus::Pending,
            dry_run,
            trades: Vec::new(),
            total_value_cents: 0,
            started_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
            results: ExecutionResults::default(),
        }
    }

    /// Mark failed before any trade was attempted.
    pub fn fail_systemic(&mut self, message: String) {
        error!("execution {} failed: {message}", self.id);
        self.errors.push(message);
        self.finish(ExecutionStatus::Failed, 0);
    }

    /// Set the terminal status and fill in the results.
    pub(crate) fn finish(&mut self, status: ExecutionStatus, recommended: usize) {
        let executed = self.trades.iter().filter(|t| t.status.is_executed()).count();
        self.results.trades_executed = executed;
        self.results.trades_failed = self.trades.len() - executed;
        self.results.total_cost_cents = self.trades.iter().map(|t| t.total_cost_cents).sum();
        self.results.improvement_score = if recommended > 0 {
            executed as f64 / recommended as f64 * 100.0
        } else {
            0.0
        };
        self.total_value_cents = self.trades.iter().map(|t| t.filled_notional_cents()).sum();
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}

/// Map a trade action to a broker side.
pub fn action_to_side(action: TradeAction) -> BrokerSide {
    match action {
        TradeAction::Buy => BrokerSide::Buy,
        TradeAction::Sell => BrokerSide::Sell,
    }
}

/// Limit price offset from `reference_cents`: buys above, sells below.
pub fn limit_price(reference_cents: i64, action: TradeAction, offset_bps: u32) -> i64 {
    let offset = reference_cents * offset_bps as i64 / 10_000;
    match action {
        TradeAction::Buy => reference_cents + offset,
        TradeAction::Sell => reference_cents - offset,
    }
}

/// Trades by descending priority, ties by symbol.
pub(crate) fn priority_order(trades: &[TradeRecommendation]) -> Vec<&TradeRecommendation> {
    let mut ordered: Vec<&TradeRecommendation> = trades.iter().collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    ordered
}

/// Sleep for the rate-limit interval between orders.
fn rate_limit_delay(interval_ms: u64) {
    if interval_ms > 0 {
        thread::sleep(Duration::from_millis(interval_ms));
    }
}

/// Sends trades to a broker and records what happened.
pub struct ExecutionEngine<'a> {
    broker: &'a dyn BrokerPort,
    settings: &'a ExecutionConfig,
    cost_model: CostModel,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(broker: &'a dyn BrokerPort, settings: &'a ExecutionConfig, cost_model: CostModel) -> Self {
        Self {
            broker,
            settings,
            cost_model,
        }
    }

    /// Execute every trade in `recommendation`, highest priority first.
    pub fn run(
        &self,
        id: String,
        recommendation: &RebalanceRecommendation,
        cancel: &CancellationToken,
    ) -> RebalanceExecution {
        let mut execution = RebalanceExecution::pending(id, recommendation, false);
        execution.status = ExecutionStatus::Executing;
        let total = recommendation.trades.len();
        info!(
            "execution {}: {} trade(s) for portfolio {}",
            execution.id, total, execution.portfolio_id
        );

        for (i, trade) in priority_order(&recommendation.trades).into_iter().enumerate() {
            if cancel.is_cancelled() {
                let message = format!("cancelled after {i} of {total} trade(s)");
                warn!("execution {}: {message}", execution.id);
                execution.errors.push(message);
                execution.finish(ExecutionStatus::Failed, total);
                return execution;
            }
            if i > 0 {
                rate_limit_delay(self.settings.order_interval_ms);
            }

            let record = self.execute_trade(trade);
            match record.status {
                TradeStatus::Filled => info!(
                    "[{}/{}] {} {} {} FILLED @ {:?}",
                    i + 1,
                    total,
                    trade.action,
                    record.filled_shares,
                    trade.symbol,
                    record.avg_fill_price_cents
                ),
                TradeStatus::Partial => warn!(
                    "[{}/{}] {} {} PARTIAL {}/{}",
                    i + 1,
                    total,
                    trade.action,
                    trade.symbol,
                    record.filled_shares,
                    record.requested_shares
                ),
                _ => error!(
                    "[{}/{}] {} {} {:?}: {}",
                    i + 1,
                    total,
                    trade.action,
                    trade.symbol,
                    record.status,
                    record.error.as_deref().unwrap_or("no fill")
                ),
            }
            if let Some(err) = &record.error {
                execution.errors.push(format!("{}: {err}", trade.symbol));
            }
            execution.trades.push(record);
        }

        execution.finish(ExecutionStatus::Completed, total);
        info!(
            "execution {} completed: {} executed, {} failed",
            execution.id, execution.results.trades_executed, execution.results.trades_failed
        );
        execution
    }

    fn order_for(&self, trade: &TradeRecommendation) -> BrokerOrder {
        let order_type = match self.settings.order_type {
            OrderTypeSetting::Market => BrokerOrderType::Market,
            OrderTypeSetting::Limit => BrokerOrderType::Limit(limit_price(
                trade.price_cents,
                trade.action,
                self.settings.limit_offset_bps,
            )),
        };
        BrokerOrder {
            symbol: trade.symbol,
            side: action_to_side(trade.action),
            quantity: trade.shares,
            order_type,
            time_in_force: self.settings.time_in_force,
        }
    }

    fn execute_trade(&self, trade: &TradeRecommendation) -> TradeExecution {
        let mut record = TradeExecution::pending(trade);
        let order = self.order_for(trade);

        let ack = match self.broker.place_order(&order) {
            Ok(ack) => ack,
            Err(e) => {
                record.fail(e.to_string());
                return record;
            }
        };
        record.order_id = Some(ack.order_id.to_string());

        let ack = match self.await_terminal(ack) {
            Ok(ack) => ack,
            Err(e) => {
                record.fail(format!("status poll failed: {e}"));
                return record;
            }
        };

        record.timestamp = Utc::now();
        record.filled_shares = ack.filled_quantity.max(0.0);
        if record.filled_shares > FILL_EPSILON {
            record.avg_fill_price_cents = Some(ack.avg_fill_price_cents.unwrap_or(trade.price_cents));
            record.total_cost_cents = self.cost_model.compute_cost(record.filled_notional_cents());
        }

        let filled_any = record.filled_shares > FILL_EPSILON;
        let filled_all = record.filled_shares + FILL_EPSILON >= record.requested_shares;
        record.status = match ack.state {
            OrderState::Filled if filled_all => TradeStatus::Filled,
            OrderState::Filled => TradeStatus::Partial,
            OrderState::Cancelled | OrderState::Expired if filled_any => TradeStatus::Partial,
            OrderState::Cancelled | OrderState::Expired => TradeStatus::Cancelled,
            OrderState::Rejected => TradeStatus::Failed,
            // await_terminal only returns terminal states
            OrderState::Pending | OrderState::Submitted | OrderState::PartiallyFilled => {
                TradeStatus::Failed
            }
        };
        match record.status {
            TradeStatus::Failed => {
                let reason = ack.message.unwrap_or_else(|| "rejected by broker".into());
                record.error = Some(format!("rejected: {reason}"));
            }
            TradeStatus::Cancelled => {
                record.error = Some(format!("order {:?} with no fill", ack.state).to_lowercase());
            }
            _ => {}
        }
        record
    }

    /// Poll until the order reaches a terminal state. No timeout.
    fn await_terminal(&self, mut ack: OrderAck) -> Result<OrderAck, BrokerError> {
        while !ack.state.is_terminal() {
            debug!(
                "order {} {:?}, filled {}",
                ack.order_id, ack.state, ack.filled_quantity
            );
            rate_limit_delay(self.settings.poll_interval_ms);
            ack = self.broker.order_status(&ack.order_id)?;
        }
        Ok(ack)
    }
}
