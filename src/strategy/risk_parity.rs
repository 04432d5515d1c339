//! Risk parity: equalise each position's share of portfolio risk.
//!
//! A position's risk contribution is approximated as `weight × volatility`,
//! ignoring correlations. Equal contributions are reached with weights
//! proportional to `1 / volatility`.

use crate::error::ValidationError;
use crate::market::Quote;
use crate::portfolio::AssetAllocation;
use crate::recommendation::Urgency;

use super::sizing::size_trade;
use super::{Evaluation, EvaluationContext, StrategyEvaluator, require_positive};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RiskParityParams {
    /// Relative deviation from an equal risk share that triggers a trade
    /// (0.20 = 20% off).
    pub deviation_tolerance: f64,
}

impl Default for RiskParityParams {
    fn default() -> Self {
        Self {
            deviation_tolerance: 0.20,
        }
    }
}

impl StrategyEvaluator for RiskParityParams {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        let members: Vec<(&AssetAllocation, &Quote)> = ctx
            .snapshot
            .priced()
            .filter(|(_, q)| q.volatility > 0.0)
            .collect();
        if members.len() < 2 {
            return Evaluation::idle("risk parity needs at least two volatile positions");
        }

        let total_risk: f64 = members
            .iter()
            .map(|(a, q)| a.current_percent * q.volatility)
            .sum();
        if total_risk <= 0.0 {
            return Evaluation::idle("no risk to distribute");
        }

        let equal_share = 1.0 / members.len() as f64;
        let deviation = |a: &AssetAllocation, q: &Quote| {
            let share = a.current_percent * q.volatility / total_risk;
            (share - equal_share).abs() / equal_share
        };
        let worst = members
            .iter()
            .map(|(a, q)| deviation(a, q))
            .fold(0.0_f64, f64::max);
        if worst <= self.deviation_tolerance {
            return Evaluation::idle(format!(
                "risk contributions within {:.0}% of equal",
                self.deviation_tolerance * 100.0
            ));
        }

        // Keep the invested weight; redistribute it by inverse volatility.
        let invested: f64 = members.iter().map(|(a, _)| a.current_percent).sum();
        let inverse_sum: f64 = members.iter().map(|(_, q)| 1.0 / q.volatility).sum();
        let min_trade = ctx.strategy.params.min_trade_cents;

        let trades: Vec<_> = members
            .iter()
            .filter(|(a, q)| deviation(a, q) > self.deviation_tolerance)
            .filter_map(|(allocation, quote)| {
                let desired = invested * (1.0 / quote.volatility) / inverse_sum;
                let reason = format!(
                    "{} risk share off equal by {:.0}%",
                    allocation.symbol,
                    deviation(allocation, quote) * 100.0
                );
                size_trade(ctx, allocation, quote, desired, min_trade, reason)
            })
            .collect();

        let urgency = if worst > 1.5 {
            Urgency::Critical
        } else if worst > 1.0 {
            Urgency::High
        } else if worst > 0.5 {
            Urgency::Medium
        } else {
            Urgency::Low
        };

        Evaluation {
            reason: format!(
                "risk contributions deviate up to {:.0}% from equal across {} positions",
                worst * 100.0,
                members.len()
            ),
            trades,
            urgency,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_positive("deviation_tolerance", self.deviation_tolerance)
    }
}
