//! Transaction cost modeling.

/// Models transaction costs for rebalancing trades.
///
/// Costs are computed as a percentage of notional value (in basis points)
/// plus a minimum per-trade fee.
///
/// ```
/// use driftbook::portfolio::CostModel;
///
/// let model = CostModel { commission_bps: 10, slippage_bps: 5, min_trade_fee: 1_00 };
/// // 15 bps on $10,000 notional = $15.00, above the $1.00 minimum
/// assert_eq!(model.compute_cost(1_000_000), 1500);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostModel {
    /// Commission in basis points (1 bps = 0.01%)
    pub commission_bps: u32,
    /// Slippage estimate in basis points
    pub slippage_bps: u32,
    /// Minimum fee per trade (cents)
    pub min_trade_fee: i64,
}

impl CostModel {
    /// A zero-cost model (no fees, no slippage).
    pub fn zero() -> Self {
        Self {
            commission_bps: 0,
            slippage_bps: 0,
            min_trade_fee: 0,
        }
    }

    /// Compute the total cost for a trade with the given notional value (cents).
    ///
    /// Returns the cost in cents, which is always non-negative. A zero notional
    /// costs nothing, so the minimum fee only applies to real trades.
    pub fn compute_cost(&self, notional: i64) -> i64 {
        let notional = notional.unsigned_abs();
        // No trade, no fee
        if notional == 0 {
            return 0;
        }
        let total_bps = self.commission_bps as u64 + self.slippage_bps as u64;
        // notional * bps / 10_000, truncated to whole cents
        let bps_cost = (notional * total_bps / 10_000) as i64;
        bps_cost.max(self.min_trade_fee)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::zero()
    }
}

/// Cost and tax settings applied when sizing trades.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TradePricing {
    pub cost_model: CostModel,
    /// Tax rate applied to realised gains, as a fraction (0.15 = 15%).
    pub tax_rate: f64,
}
