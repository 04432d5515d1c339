//! Portfolio model: holdings, target weights, and cost modeling.
//!
//! A [`Portfolio`] is a plain record. It owns the authoritative inputs
//! (quantities held, cash, target percents); everything derived from prices
//! lives in the snapshot produced by
//! [`AllocationAnalyzer`](crate::analyzer::AllocationAnalyzer).
//!
//! # Example
//!
//! ```
//! use driftbook::portfolio::{AssetAllocation, AssetCategory, Portfolio};
//! use driftbook::Symbol;
//!
//! let portfolio = Portfolio::new("p-1", "owner-1", 10_000_00)
//!     .with_allocation(AssetAllocation::new(Symbol::new("SPY"), AssetCategory::Equity, 100.0, 60.0))
//!     .with_allocation(AssetAllocation::new(Symbol::new("BND"), AssetCategory::FixedIncome, 300.0, 40.0));
//!
//! assert!(portfolio.validate().is_ok());
//! assert_eq!(portfolio.target_sum(), 100.0);
//! ```

pub mod allocation;
pub mod cost_model;

pub use allocation::{AssetAllocation, AssetCategory};
pub use cost_model::{CostModel, TradePricing};

use rustc_hash::FxHashSet;

use crate::error::ValidationError;
use crate::recommendation::TradeAction;
use crate::types::Symbol;

/// Slack allowed on the target sum before it counts as over-allocated.
const TARGET_SUM_TOLERANCE: f64 = 1e-6;

/// A portfolio of asset allocations plus a cash balance.
///
/// All monetary values are in the smallest currency unit (cents).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Portfolio {
    pub id: String,
    pub owner_id: String,
    /// Last known total value; refreshed by every analysis.
    #[cfg_attr(feature = "serde", serde(default))]
    pub total_value_cents: i64,
    pub cash_cents: i64,
    /// Allocations, unique by symbol, in display order.
    pub allocations: Vec<AssetAllocation>,
    /// Target aggregate volatility (percent, annualised).
    #[cfg_attr(feature = "serde", serde(default))]
    pub target_risk: f64,
}

impl Portfolio {
    /// Create an empty portfolio holding only cash.
    pub fn new(id: impl Into<String>, owner_id: impl Into<String>, cash_cents: i64) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            total_value_cents: cash_cents,
            cash_cents,
            allocations: Vec::new(),
            target_risk: 0.0,
        }
    }

    pub fn with_allocation(mut self, allocation: AssetAllocation) -> Self {
        self.allocations.push(allocation);
        self
    }

    pub fn with_target_risk(mut self, target_risk: f64) -> Self {
        self.target_risk = target_risk;
        self
    }

    // === Queries ===

    /// Get an allocation by symbol, if it exists.
    pub fn allocation(&self, symbol: &Symbol) -> Option<&AssetAllocation> {
        self.allocations.iter().find(|a| a.symbol == *symbol)
    }

    pub fn allocation_mut(&mut self, symbol: &Symbol) -> Option<&mut AssetAllocation> {
        self.allocations.iter_mut().find(|a| a.symbol == *symbol)
    }

    /// Symbols of all allocations, in portfolio order.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.allocations.iter().map(|a| a.symbol).collect()
    }

    /// Sum of all target percents.
    pub fn target_sum(&self) -> f64 {
        self.allocations.iter().map(|a| a.target_percent).sum()
    }

    /// Validate structural invariants.
    ///
    /// - symbols are unique
    /// - every percent is finite and within [0, 100], bounds are ordered
    /// - the target sum does not exceed 100
    /// - quantities and cash are non-negative
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.cash_cents < 0 {
            return Err(ValidationError::NegativeCash(self.cash_cents));
        }

        let mut seen = FxHashSet::default();
        for a in &self.allocations {
            if !seen.insert(a.symbol) {
                return Err(ValidationError::DuplicateSymbol(a.symbol));
            }
            if !a.quantity.is_finite() || a.quantity < 0.0 {
                return Err(ValidationError::InvalidQuantity {
                    symbol: a.symbol,
                    quantity: a.quantity,
                });
            }
            check_percent(a.symbol, "target_percent", a.target_percent)?;
            if let Some(min) = a.min_percent {
                check_percent(a.symbol, "min_percent", min)?;
            }
            if let Some(max) = a.max_percent {
                check_percent(a.symbol, "max_percent", max)?;
            }
            if let (Some(min), Some(max)) = (a.min_percent, a.max_percent) {
                if min > max {
                    return Err(ValidationError::InvertedBounds {
                        symbol: a.symbol,
                        min,
                        max,
                    });
                }
            }
        }

        let sum = self.target_sum();
        if sum > 100.0 + TARGET_SUM_TOLERANCE {
            return Err(ValidationError::TargetSumExceeded(sum));
        }
        Ok(())
    }

    // === Mutation ===

    /// Apply an executed fill to holdings and cash.
    ///
    /// `fees` (cents) reduce cash for both buys and sells. Unknown symbols
    /// are ignored; the engine only trades symbols it allocated.
    pub fn apply_fill(
        &mut self,
        symbol: &Symbol,
        action: TradeAction,
        shares: f64,
        price_cents: i64,
        fees: i64,
    ) {
        let Some(allocation) = self.allocation_mut(symbol) else {
            return;
        };
        let notional = (shares * price_cents as f64).round() as i64;
        match action {
            TradeAction::Buy => {
                allocation.quantity += shares;
                self.cash_cents -= notional + fees;
            }
            TradeAction::Sell => {
                allocation.quantity = (allocation.quantity - shares).max(0.0);
                self.cash_cents += notional - fees;
            }
        }
    }
}

fn check_percent(symbol: Symbol, field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(ValidationError::PercentOutOfRange {
            symbol,
            field,
            value,
        });
    }
    Ok(())
}
