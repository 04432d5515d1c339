//! Converting a desired weight into a sized trade.

use crate::market::Quote;
use crate::portfolio::AssetAllocation;
use crate::recommendation::{TaxImplication, TradeAction, TradeRecommendation};
use crate::types::value_at_percent;

use super::EvaluationContext;

/// Share quantities are rounded down to this many units per share.
const SHARE_LOTS: f64 = 10_000.0;

/// Floor a share count to four decimal places.
#[inline]
pub(crate) fn floor_shares(shares: f64) -> f64 {
    (shares * SHARE_LOTS).floor() / SHARE_LOTS
}

/// Size a trade moving `allocation` from its current weight to `desired_percent`.
///
/// The desired weight is clamped to the allocation's own bounds, then to the
/// strategy's position constraints. The difference is capped by
/// `max_trade_percent`, converted to whole lots at the quote price, and
/// dropped if the resulting notional is below `min_notional`. Sells never
/// exceed the quantity held.
pub(crate) fn size_trade(
    ctx: &EvaluationContext<'_>,
    allocation: &AssetAllocation,
    quote: &Quote,
    desired_percent: f64,
    min_notional: i64,
    reason: String,
) -> Option<TradeRecommendation> {
    let total = ctx.snapshot.total_value_cents();
    if total <= 0 || quote.price_cents <= 0 {
        return None;
    }
    let params = &ctx.strategy.params;
    let target = ctx
        .strategy
        .constraints
        .clamp_percent(allocation.clamp_percent(desired_percent));

    let mut difference = value_at_percent(total, target) - allocation.current_value_cents;
    if let Some(cap_pct) = params.max_trade_percent {
        let cap = value_at_percent(total, cap_pct);
        difference = difference.clamp(-cap, cap);
    }
    if difference == 0 {
        return None;
    }

    let action = if difference > 0 {
        TradeAction::Buy
    } else {
        TradeAction::Sell
    };
    let price = quote.price_cents;
    let mut shares = floor_shares(difference.unsigned_abs() as f64 / price as f64);
    if action == TradeAction::Sell {
        shares = shares.min(allocation.quantity);
    }
    if shares <= 0.0 {
        return None;
    }

    let notional = (shares * price as f64).round() as i64;
    if notional < min_notional.max(1) {
        return None;
    }

    let tax_implication = match (action, allocation.avg_cost_cents) {
        (TradeAction::Sell, Some(avg_cost)) => {
            let realized_gain_cents = ((price - avg_cost) as f64 * shares).round() as i64;
            let estimated_tax_cents = if realized_gain_cents > 0 {
                (realized_gain_cents as f64 * ctx.pricing.tax_rate).round() as i64
            } else {
                0
            };
            Some(TaxImplication {
                realized_gain_cents,
                estimated_tax_cents,
            })
        }
        _ => None,
    };

    let mut priority = ((target - allocation.current_percent).abs() * 100.0).round() as u32;
    let realises_gain = tax_implication.is_some_and(|t| t.realized_gain_cents > 0);
    if params.tax_optimized && realises_gain {
        priority /= 2;
    }

    Some(TradeRecommendation {
        symbol: allocation.symbol,
        action,
        shares,
        notional_cents: notional,
        price_cents: price,
        target_percent: target,
        current_percent: allocation.current_percent,
        reason,
        priority,
        estimated_cost_cents: ctx.pricing.cost_model.compute_cost(notional),
        tax_implication,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::{AssetCategory, CostModel, TradePricing};
    use crate::strategy::test_support::{snapshot, sym};
    use crate::strategy::{
        Constraints, RebalancingStrategy, StrategyKind, StrategyParams, ThresholdParams,
    };
    use chrono::Utc;

    fn strategy() -> RebalancingStrategy {
        RebalancingStrategy::new(
            "s",
            "s",
            StrategyKind::Threshold(ThresholdParams::default()),
        )
    }

    fn size(
        strategy: &RebalancingStrategy,
        pricing: &TradePricing,
        desired: f64,
        avg_cost: Option<i64>,
    ) -> Option<TradeRecommendation> {
        // SPY 130 × $500 = $65,000 of $100,000
        let snap = snapshot(
            35_000_00,
            &[("SPY", AssetCategory::Equity, 130.0, 60.0, Quote::new(500_00, 18.0, 0.0))],
        );
        let mut alloc = snap.portfolio.allocations[0].clone();
        alloc.avg_cost_cents = avg_cost;
        let quote = *snap.quote(&sym("SPY")).unwrap();
        let ctx = EvaluationContext {
            snapshot: &snap,
            strategy,
            pricing,
            now: Utc::now(),
        };
        size_trade(&ctx, &alloc, &quote, desired, 100_00, "test".into())
    }

    #[test]
    fn sells_down_to_target() {
        let trade = size(&strategy(), &TradePricing::default(), 60.0, None).unwrap();
        assert_eq!(trade.action, TradeAction::Sell);
        assert_eq!(trade.shares, 10.0);
        assert_eq!(trade.notional_cents, 5_000_00);
        assert_eq!(trade.priority, 500);
        assert!(trade.tax_implication.is_none());
    }

    #[test]
    fn fractional_shares_floor_to_four_places() {
        // 65% → 64.99%: $10 / $500 = 0.02 shares
        let trade = size(&strategy(), &TradePricing::default(), 64.99, None);
        // below the $100 minimum
        assert!(trade.is_none());
        assert_eq!(floor_shares(1.234_56), 1.2345);
    }

    #[test]
    fn max_trade_percent_caps_difference() {
        let s = strategy().with_params(StrategyParams {
            max_trade_percent: Some(2.0),
            ..StrategyParams::default()
        });
        let trade = size(&s, &TradePricing::default(), 60.0, None).unwrap();
        assert_eq!(trade.notional_cents, 2_000_00);
    }

    #[test]
    fn position_constraint_clamps_target() {
        let s = strategy().with_constraints(Constraints {
            max_position_percent: Some(62.0),
            ..Constraints::default()
        });
        let trade = size(&s, &TradePricing::default(), 70.0, None).unwrap();
        assert_eq!(trade.action, TradeAction::Sell);
        assert_eq!(trade.target_percent, 62.0);
    }

    #[test]
    fn sell_never_exceeds_holding() {
        let trade = size(&strategy(), &TradePricing::default(), 0.0, None).unwrap();
        assert_eq!(trade.shares, 130.0);
    }

    #[test]
    fn gain_taxed_and_costed() {
        let pricing = TradePricing {
            cost_model: CostModel {
                commission_bps: 10,
                slippage_bps: 0,
                min_trade_fee: 0,
            },
            tax_rate: 0.15,
        };
        let trade = size(&strategy(), &pricing, 60.0, Some(400_00)).unwrap();
        let tax = trade.tax_implication.unwrap();
        assert_eq!(tax.realized_gain_cents, 1_000_00);
        assert_eq!(tax.estimated_tax_cents, 150_00);
        assert_eq!(trade.estimated_cost_cents, 5_00);
    }

    #[test]
    fn loss_owes_no_tax() {
        let pricing = TradePricing {
            tax_rate: 0.15,
            ..TradePricing::default()
        };
        let trade = size(&strategy(), &pricing, 60.0, Some(600_00)).unwrap();
        let tax = trade.tax_implication.unwrap();
        assert_eq!(tax.realized_gain_cents, -1_000_00);
        assert_eq!(tax.estimated_tax_cents, 0);
    }

    #[test]
    fn tax_optimized_halves_priority_of_gains() {
        let s = strategy().with_params(StrategyParams {
            tax_optimized: true,
            ..StrategyParams::default()
        });
        let trade = size(&s, &TradePricing::default(), 60.0, Some(400_00)).unwrap();
        assert_eq!(trade.priority, 250);
    }
}
