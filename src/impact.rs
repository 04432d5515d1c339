//! Estimated impact of a finalized trade list.
//!
//! The figures are heuristics driven by strategy-supplied coefficients. They
//! summarise how much weight a recommendation moves and what it costs; they
//! are not return or risk forecasts.

use crate::error::ValidationError;
use crate::recommendation::{EstimatedImpact, TradeRecommendation};
use crate::types::percent_of;

/// Coefficients turning weight moved into return and risk estimates.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ImpactCoefficients {
    /// Return points credited per point of weight corrected.
    pub return_coefficient: f64,
    /// Volatility points removed per point of weight corrected.
    pub risk_coefficient: f64,
}

impl Default for ImpactCoefficients {
    fn default() -> Self {
        Self {
            return_coefficient: 0.01,
            risk_coefficient: 0.05,
        }
    }
}

impl ImpactCoefficients {
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, v) in [
            ("return_coefficient", self.return_coefficient),
            ("risk_coefficient", self.risk_coefficient),
        ] {
            if !v.is_finite() {
                return Err(ValidationError::InvalidParameter {
                    name,
                    reason: format!("must be finite, got {v}"),
                });
            }
        }
        Ok(())
    }
}

/// Estimate the impact of `trades` on a portfolio worth `total_value_cents`.
pub fn estimate_impact(
    trades: &[TradeRecommendation],
    total_value_cents: i64,
    coefficients: &ImpactCoefficients,
) -> EstimatedImpact {
    let weight_moved: f64 = trades.iter().map(TradeRecommendation::weight_change).sum();
    let trading_costs_cents: i64 = trades.iter().map(|t| t.estimated_cost_cents).sum();

    let (tax_implication_cents, estimated_tax_cents) = trades
        .iter()
        .filter_map(|t| t.tax_implication)
        .fold((0_i64, 0_i64), |(gain, tax), t| {
            (gain + t.realized_gain_cents, tax + t.estimated_tax_cents)
        });

    let cost_pct = percent_of(trading_costs_cents, total_value_cents);

    EstimatedImpact {
        expected_return: coefficients.return_coefficient * weight_moved - cost_pct,
        risk_reduction: coefficients.risk_coefficient * weight_moved,
        trading_costs_cents,
        tax_implication_cents,
        estimated_tax_cents,
    }
}
