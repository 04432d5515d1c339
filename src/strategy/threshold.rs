//! Threshold strategy: trade any position whose drift reaches a fixed level.

use crate::recommendation::Urgency;
use crate::types::DRIFT_EPSILON;

use super::sizing::size_trade;
use super::{Evaluation, EvaluationContext, StrategyEvaluator, require_positive};

/// Rebalance positions drifting by at least `threshold_percent` points.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThresholdParams {
    pub threshold_percent: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            threshold_percent: 5.0,
        }
    }
}

impl StrategyEvaluator for ThresholdParams {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        let threshold = self.threshold_percent;
        let min_trade = ctx.strategy.params.min_trade_cents;

        let mut trades = Vec::new();
        let mut worst = 0.0_f64;
        for (allocation, quote) in ctx.snapshot.priced() {
            let Some(drift) = allocation.drift else {
                continue;
            };
            if drift.abs() < threshold - DRIFT_EPSILON {
                continue;
            }
            worst = worst.max(drift.abs());
            let reason = format!(
                "{} drifted {:+.2}% from {:.2}% target",
                allocation.symbol, drift, allocation.target_percent
            );
            if let Some(trade) = size_trade(
                ctx,
                allocation,
                quote,
                allocation.target_percent,
                min_trade,
                reason,
            ) {
                trades.push(trade);
            }
        }

        if trades.is_empty() {
            return Evaluation::idle(format!("all positions within {threshold:.2}% drift"));
        }

        let ratio = worst / threshold;
        let urgency = if ratio > 3.0 {
            Urgency::Critical
        } else if ratio > 2.0 {
            Urgency::High
        } else if ratio > 1.5 {
            Urgency::Medium
        } else {
            Urgency::Low
        };

        Evaluation {
            reason: format!(
                "{} position(s) beyond {threshold:.2}% drift (max {worst:.2}%)",
                trades.len()
            ),
            trades,
            urgency,
        }
    }

    fn validate(&self) -> Result<(), crate::error::ValidationError> {
        require_positive("threshold_percent", self.threshold_percent)
    }
}
