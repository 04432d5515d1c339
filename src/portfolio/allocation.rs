//! A single asset allocation within a portfolio.

use crate::types::Symbol;

/// Broad asset class of an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AssetCategory {
    Equity,
    FixedIncome,
    Alternatives,
    Cash,
    Crypto,
}

impl AssetCategory {
    /// Asset classes whose weight is penalised when markets turn volatile.
    pub fn is_risk_asset(self) -> bool {
        matches!(
            self,
            AssetCategory::Equity | AssetCategory::Crypto | AssetCategory::Alternatives
        )
    }
}

/// One line of a portfolio: what is held and what should be held.
///
/// `current_value_cents`, `current_percent`, and `drift` are snapshot fields.
/// They are recomputed from live prices by the
/// [`AllocationAnalyzer`](crate::analyzer::AllocationAnalyzer) on every
/// analysis and are never authoritative.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssetAllocation {
    pub symbol: Symbol,
    pub category: AssetCategory,
    /// Shares (or units) held. Fractional holdings are allowed.
    pub quantity: f64,
    pub target_percent: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub current_percent: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub current_value_cents: i64,
    /// `current_percent - target_percent`; `None` when the price is unknown.
    #[cfg_attr(feature = "serde", serde(default))]
    pub drift: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_percent: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_percent: Option<f64>,
    /// Average cost per share (cents), for realised gain estimates.
    #[cfg_attr(feature = "serde", serde(default))]
    pub avg_cost_cents: Option<i64>,
}

impl AssetAllocation {
    pub fn new(symbol: Symbol, category: AssetCategory, quantity: f64, target_percent: f64) -> Self {
        Self {
            symbol,
            category,
            quantity,
            target_percent,
            current_percent: 0.0,
            current_value_cents: 0,
            drift: None,
            min_percent: None,
            max_percent: None,
            avg_cost_cents: None,
        }
    }

    pub fn with_bounds(mut self, min_percent: Option<f64>, max_percent: Option<f64>) -> Self {
        self.min_percent = min_percent;
        self.max_percent = max_percent;
        self
    }

    pub fn with_avg_cost(mut self, avg_cost_cents: i64) -> Self {
        self.avg_cost_cents = Some(avg_cost_cents);
        self
    }

    /// Whether the last analysis produced a price for this allocation.
    #[inline]
    pub fn is_priced(&self) -> bool {
        self.drift.is_some()
    }

    /// Clamp a desired weight to this allocation's own bounds.
    pub fn clamp_percent(&self, percent: f64) -> f64 {
        let lo = self.min_percent.unwrap_or(0.0);
        let hi = self.max_percent.unwrap_or(100.0);
        percent.max(lo).min(hi)
    }
}
