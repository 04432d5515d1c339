//! Trade and recommendation types produced by analysis.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::types::Symbol;

/// Trade direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    /// `+1.0` for buys, `-1.0` for sells.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            TradeAction::Buy => 1.0,
            TradeAction::Sell => -1.0,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => f.pad("BUY"),
            TradeAction::Sell => f.pad("SELL"),
        }
    }
}

/// Coarse priority attached to a recommendation.
///
/// Ordered `Low < Medium < High < Critical`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        };
        f.pad(s)
    }
}

/// Tax consequence of a sell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaxImplication {
    /// Realised gain (positive) or loss (negative), cents.
    pub realized_gain_cents: i64,
    /// Tax owed on the gain; zero for losses.
    pub estimated_tax_cents: i64,
}

/// One proposed trade.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TradeRecommendation {
    pub symbol: Symbol,
    pub action: TradeAction,
    pub shares: f64,
    pub notional_cents: i64,
    /// Reference price used for sizing (cents).
    pub price_cents: i64,
    pub target_percent: f64,
    pub current_percent: f64,
    pub reason: String,
    /// Execution order key, higher first. Basis points of weight moved.
    pub priority: u32,
    pub estimated_cost_cents: i64,
    pub tax_implication: Option<TaxImplication>,
}

impl TradeRecommendation {
    /// Signed notional: positive for buys, negative for sells.
    #[inline]
    pub fn signed_notional(&self) -> i64 {
        match self.action {
            TradeAction::Buy => self.notional_cents,
            TradeAction::Sell => -self.notional_cents,
        }
    }

    /// Absolute weight change in percentage points.
    #[inline]
    pub fn weight_change(&self) -> f64 {
        (self.target_percent - self.current_percent).abs()
    }
}

/// Heuristic summary of what a recommendation would do.
///
/// `expected_return` and `risk_reduction` come from strategy-supplied
/// coefficients applied to the weight moved. They are estimates, not forecasts.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatedImpact {
    /// Percentage points of return, net of trading costs.
    pub expected_return: f64,
    /// Percentage points of volatility removed.
    pub risk_reduction: f64,
    pub trading_costs_cents: i64,
    /// Net realised gain/loss across sells (cents).
    pub tax_implication_cents: i64,
    pub estimated_tax_cents: i64,
}

/// A complete, immutable proposal from one strategy for one portfolio.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceRecommendation {
    pub portfolio_id: String,
    pub strategy_id: String,
    pub strategy_name: String,
    pub reason: String,
    pub urgency: Urgency,
    pub estimated_impact: EstimatedImpact,
    /// Trades in execution order (descending priority).
    pub trades: Vec<TradeRecommendation>,
    pub total_trade_value_cents: i64,
    /// Whether execution must happen inside market hours.
    #[cfg_attr(feature = "serde", serde(default))]
    pub market_hours_only: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_ordering() {
        assert!(Urgency::Critical > Urgency::High);
        assert!(Urgency::High > Urgency::Medium);
        assert!(Urgency::Medium > Urgency::Low);
    }

    #[test]
    fn display() {
        assert_eq!(format!("{}", TradeAction::Buy), "BUY");
        assert_eq!(format!("{}", Urgency::Critical), "critical");
    }

    #[test]
    fn signed_notional_and_weight_change() {
        let trade = TradeRecommendation {
            symbol: Symbol::new("SPY"),
            action: TradeAction::Sell,
            shares: 10.0,
            notional_cents: 5_000_00,
            price_cents: 500_00,
            target_percent: 60.0,
            current_percent: 65.0,
            reason: "drift".into(),
            priority: 500,
            estimated_cost_cents: 0,
            tax_implication: None,
        };
        assert_eq!(trade.signed_notional(), -5_000_00);
        assert_eq!(trade.weight_change(), 5.0);
    }
}
