//! Volatility targeting: scale risky weights toward a target portfolio volatility.

use crate::error::ValidationError;
use crate::recommendation::Urgency;

use super::sizing::size_trade;
use super::{Evaluation, EvaluationContext, StrategyEvaluator, invalid, require_positive};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VolatilityTargetParams {
    /// Target aggregate volatility (percent). Falls back to the portfolio's
    /// `target_risk` when unset.
    pub risk_target: Option<f64>,
    /// No action while |current - target| is within this many points.
    pub tolerance: f64,
    /// Fraction of the full scaling applied per run, in (0, 1].
    pub adjustment_rate: f64,
}

impl Default for VolatilityTargetParams {
    fn default() -> Self {
        Self {
            risk_target: None,
            tolerance: 2.0,
            adjustment_rate: 1.0,
        }
    }
}

impl StrategyEvaluator for VolatilityTargetParams {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        let snapshot = ctx.snapshot;
        let target = self
            .risk_target
            .unwrap_or(snapshot.portfolio.target_risk);
        let current = snapshot.aggregate_volatility;
        let gap = current - target;

        if gap.abs() <= self.tolerance {
            return Evaluation::idle(format!(
                "volatility {current:.2}% within {:.2} of {target:.2}% target",
                self.tolerance
            ));
        }

        let volatile_weight: f64 = snapshot
            .priced()
            .filter(|(_, q)| q.volatility > 0.0)
            .map(|(a, _)| a.current_percent)
            .sum();
        if current <= 0.0 || volatile_weight <= 0.0 {
            return Evaluation::idle("no volatile holdings to scale");
        }

        // Weight not being scaled stays put, so volatile holdings may grow
        // only into the remaining room.
        let fixed_weight: f64 = snapshot
            .portfolio
            .allocations
            .iter()
            .map(|a| a.current_percent)
            .sum::<f64>()
            - volatile_weight;
        let room = (100.0 - fixed_weight).max(0.0);
        let factor = (target / current).min(room / volatile_weight);
        let scale = 1.0 + self.adjustment_rate * (factor - 1.0);

        let min_trade = ctx.strategy.params.min_trade_cents;
        let trades: Vec<_> = snapshot
            .priced()
            .filter(|(_, q)| q.volatility > 0.0)
            .filter_map(|(allocation, quote)| {
                let desired = allocation.current_percent * scale;
                let reason = format!(
                    "scale {} by {scale:.3} toward {target:.2}% volatility",
                    allocation.symbol
                );
                size_trade(ctx, allocation, quote, desired, min_trade, reason)
            })
            .collect();

        let urgency = if gap.abs() > 5.0 {
            Urgency::High
        } else if gap.abs() > 3.0 {
            Urgency::Medium
        } else {
            Urgency::Low
        };

        Evaluation {
            reason: format!("aggregate volatility {current:.2}% vs {target:.2}% target ({gap:+.2})"),
            trades,
            urgency,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if let Some(target) = self.risk_target {
            if !target.is_finite() || target < 0.0 {
                return Err(invalid("risk_target", format!("must be finite and >= 0, got {target}")));
            }
        }
        require_positive("tolerance", self.tolerance)?;
        if !(self.adjustment_rate > 0.0 && self.adjustment_rate <= 1.0) {
            return Err(invalid(
                "adjustment_rate",
                format!("must be in (0, 1], got {}", self.adjustment_rate),
            ));
        }
        Ok(())
    }
}
