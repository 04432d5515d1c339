// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! Property-based tests for analysis and optimization invariants.
//!
//! These tests use proptest to verify that key invariants hold
//! across randomly generated portfolios and trade lists.

use driftbook::{
    AllocationAnalyzer, AssetAllocation, AssetCategory, Constraints, Portfolio, Quote,
    RebalancingStrategy, StaticMarketData, StrategyKind, StrategyParams, Symbol, ThresholdParams,
    TradeAction, TradePricing, TradeRecommendation, optimize_trades,
};
use proptest::prelude::*;

const TICKERS: [&str; 6] = ["SPY", "BND", "VTI", "QQQ", "GLD", "TLT"];

/// Generate a holding: (quantity, price cents, volatility)
fn holding_strategy() -> impl Strategy<Value = (f64, i64, f64)> {
    (0u32..=5_000u32, 1_00i64..=1_000_00i64, 0.0f64..=60.0f64)
        .prop_map(|(qty, price, vol)| (qty as f64 / 10.0, price, vol))
}

fn action_strategy() -> impl Strategy<Value = TradeAction> {
    prop_oneof![Just(TradeAction::Buy), Just(TradeAction::Sell)]
}

/// Generate a provisional trade on one of a small set of tickers, so that
/// merging actually happens.
fn trade_strategy() -> impl Strategy<Value = TradeRecommendation> {
    (0usize..TICKERS.len(), action_strategy(), 1u32..=2_000u32, 0u32..=2_000u32).prop_map(
        |(i, action, lots, priority)| {
            let shares = lots as f64 / 10.0;
            let price_cents = 100_00;
            TradeRecommendation {
                symbol: Symbol::new(TICKERS[i]),
                action,
                shares,
                notional_cents: (shares * price_cents as f64).round() as i64,
                price_cents,
                target_percent: 10.0,
                current_percent: 10.0,
                reason: String::new(),
                priority,
                estimated_cost_cents: 0,
                tax_implication: None,
            }
        },
    )
}

fn strategy(max_daily_trades: usize, min_trade_cents: i64) -> RebalancingStrategy {
    RebalancingStrategy::new(
        "prop",
        "prop",
        StrategyKind::Threshold(ThresholdParams::default()),
    )
    .with_params(StrategyParams {
        min_trade_cents,
        ..StrategyParams::default()
    })
    .with_constraints(Constraints {
        max_daily_trades,
        exclude_symbols: vec![Symbol::new("GLD")],
        ..Constraints::default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // ANALYZER INVARIANTS
    // ========================================================================

    /// Weights match values, total is cash plus holdings, drift is current - target.
    #[test]
    fn analyzer_percent_invariant(
        cash in 0i64..=10_000_000_00i64,
        holdings in prop::collection::vec(holding_strategy(), 1..=TICKERS.len()),
    ) {
        let mut portfolio = Portfolio::new("p", "o", cash);
        let market = StaticMarketData::new();
        let target = 100.0 / holdings.len() as f64;
        for (i, (qty, price, vol)) in holdings.iter().enumerate() {
            let sym = Symbol::new(TICKERS[i]);
            portfolio = portfolio.with_allocation(
                AssetAllocation::new(sym, AssetCategory::Equity, *qty, target),
            );
            market.set_quote(sym, Quote::new(*price, *vol, 0.0));
        }

        let snap = AllocationAnalyzer::new(&market).analyze(&portfolio);
        let total = snap.total_value_cents();
        let invested: i64 = snap.portfolio.allocations.iter().map(|a| a.current_value_cents).sum();
        prop_assert_eq!(total, cash + invested);

        for a in &snap.portfolio.allocations {
            if total > 0 {
                let expected = a.current_value_cents as f64 / total as f64 * 100.0;
                prop_assert!((a.current_percent - expected).abs() < 1e-9);
            }
            let drift = a.drift.unwrap_or(f64::NAN);
            prop_assert!((drift - (a.current_percent - a.target_percent)).abs() < 1e-9);
        }

        let weight_sum: f64 = snap.portfolio.allocations.iter().map(|a| a.current_percent).sum();
        prop_assert!(weight_sum <= 100.0 + 1e-6);
        prop_assert!(snap.aggregate_volatility >= 0.0);
    }

    // ========================================================================
    // OPTIMIZER INVARIANTS
    // ========================================================================

    /// optimize(optimize(x)) == optimize(x)
    #[test]
    fn optimizer_idempotent(
        trades in prop::collection::vec(trade_strategy(), 0..20),
        max_trades in 1usize..=8,
        min_trade in 0i64..=5_000_00i64,
    ) {
        let s = strategy(max_trades, min_trade);
        let pricing = TradePricing::default();
        let once = optimize_trades(trades, &s, &pricing);
        let twice = optimize_trades(once.clone(), &s, &pricing);
        prop_assert_eq!(once, twice);
    }

    /// Output is unique by symbol, bounded, sorted, and above the minimum.
    #[test]
    fn optimizer_output_shape(
        trades in prop::collection::vec(trade_strategy(), 0..20),
        max_trades in 1usize..=8,
        min_trade in 0i64..=5_000_00i64,
    ) {
        let s = strategy(max_trades, min_trade);
        let out = optimize_trades(trades, &s, &TradePricing::default());

        prop_assert!(out.len() <= max_trades);
        for t in &out {
            prop_assert!(t.notional_cents >= min_trade);
            prop_assert!(t.shares > 0.0);
            prop_assert!(t.symbol != Symbol::new("GLD"));
        }
        for pair in out.windows(2) {
            prop_assert!(pair[0].symbol != pair[1].symbol);
            prop_assert!(pair[0].priority >= pair[1].priority);
        }
        let mut symbols: Vec<_> = out.iter().map(|t| t.symbol).collect();
        symbols.sort();
        symbols.dedup();
        prop_assert_eq!(symbols.len(), out.len());
    }
}
