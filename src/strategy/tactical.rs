//! Tactical allocation: tilt targets by momentum and market volatility.

use crate::error::ValidationError;
use crate::recommendation::Urgency;

use super::sizing::size_trade;
use super::{Evaluation, EvaluationContext, StrategyEvaluator, invalid};

/// Aggregate volatility above which tactical moves are urgent.
const STRESSED_VOLATILITY: f64 = 25.0;

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TacticalParams {
    /// Tilt per point of momentum, as a fraction of target per 100 points.
    pub momentum_coefficient: f64,
    /// Tilt against risk assets per point of volatility above the pivot.
    pub volatility_coefficient: f64,
    /// Aggregate volatility (percent) above which risk assets are trimmed.
    pub volatility_pivot: f64,
    /// Largest relative tilt applied to any target, in [0, 1].
    pub max_tilt: f64,
    /// Smallest weight adjustment worth trading (percentage points).
    pub min_adjustment_percent: f64,
    /// Smallest tactical trade (cents); the strategy minimum applies if larger.
    pub min_trade_cents: i64,
}

impl Default for TacticalParams {
    fn default() -> Self {
        Self {
            momentum_coefficient: 2.0,
            volatility_coefficient: 1.0,
            volatility_pivot: 20.0,
            max_tilt: 0.5,
            min_adjustment_percent: 1.0,
            min_trade_cents: 1_000_00,
        }
    }
}

impl TacticalParams {
    /// Relative tilt for a position, clamped to `±max_tilt`.
    fn tilt(&self, momentum: f64, risk_asset: bool, market_volatility: f64) -> f64 {
        let mut tilt = self.momentum_coefficient * momentum / 100.0;
        if risk_asset {
            let excess = (market_volatility - self.volatility_pivot).max(0.0);
            tilt -= self.volatility_coefficient * excess / 100.0;
        }
        tilt.clamp(-self.max_tilt, self.max_tilt)
    }
}

impl StrategyEvaluator for TacticalParams {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation {
        let market_volatility = ctx.snapshot.aggregate_volatility;
        let min_trade = self.min_trade_cents.max(ctx.strategy.params.min_trade_cents);

        let mut trades = Vec::new();
        for (allocation, quote) in ctx.snapshot.priced() {
            let tilt = self.tilt(
                quote.momentum,
                allocation.category.is_risk_asset(),
                market_volatility,
            );
            let adjustment = allocation.target_percent * tilt;
            if adjustment.abs() <= self.min_adjustment_percent {
                continue;
            }
            let desired = allocation.target_percent + adjustment;
            let reason = format!(
                "{} tilted {:+.2}pp (momentum {:+.1}%, market vol {:.1}%)",
                allocation.symbol, adjustment, quote.momentum, market_volatility
            );
            if let Some(trade) = size_trade(ctx, allocation, quote, desired, min_trade, reason) {
                trades.push(trade);
            }
        }

        if trades.is_empty() {
            return Evaluation::idle("no tactical tilt large enough to trade");
        }

        let urgency = if market_volatility > STRESSED_VOLATILITY {
            Urgency::High
        } else {
            Urgency::Medium
        };
        Evaluation {
            reason: format!(
                "tactical tilt on {} position(s); market volatility {market_volatility:.1}%",
                trades.len()
            ),
            trades,
            urgency,
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for (name, v) in [
            ("momentum_coefficient", self.momentum_coefficient),
            ("volatility_coefficient", self.volatility_coefficient),
            ("volatility_pivot", self.volatility_pivot),
            ("min_adjustment_percent", self.min_adjustment_percent),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(invalid(name, format!("must be finite and >= 0, got {v}")));
            }
        }
        if !(0.0..=1.0).contains(&self.max_tilt) {
            return Err(invalid("max_tilt", format!("must be in [0, 1], got {}", self.max_tilt)));
        }
        if self.min_trade_cents < 0 {
            return Err(invalid(
                "min_trade_cents",
                format!("must be >= 0, got {}", self.min_trade_cents),
            ));
        }
        Ok(())
    }
}
