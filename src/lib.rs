// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! # driftbook
//!
//! Portfolio drift analysis and rebalancing decisions.
//!
//! ## Features
//!
//! - **Drift analysis**: live values, weights, drift, and aggregate volatility
//! - **Five strategies**: threshold, calendar, volatility target, risk parity, tactical
//! - **Trade optimization**: exclusion, netting, minimum size, priority ordering
//! - **Impact estimates**: trading costs, realised gains, estimated tax
//! - **Integer cents**: all money is `i64` in the smallest currency unit
//!
//! ## Quick Start
//!
//! ```
//! use driftbook::{
//!     AllocationAnalyzer, AssetAllocation, AssetCategory, EvaluationContext, Portfolio, Quote,
//!     RebalancingStrategy, StaticMarketData, StrategyKind, Symbol, ThresholdParams,
//!     TradeAction, TradePricing, evaluate, optimize_trades,
//! };
//! use chrono::Utc;
//!
//! let spy = Symbol::new("SPY");
//! let bnd = Symbol::new("BND");
//!
//! // $100,000: SPY 65% and BND 35% against 60/40 targets
//! let portfolio = Portfolio::new("p-1", "owner-1", 0)
//!     .with_allocation(AssetAllocation::new(spy, AssetCategory::Equity, 130.0, 60.0))
//!     .with_allocation(AssetAllocation::new(bnd, AssetCategory::FixedIncome, 700.0, 40.0));
//!
//! let market = StaticMarketData::new()
//!     .with_quote(spy, Quote::new(500_00, 18.0, 3.0))
//!     .with_quote(bnd, Quote::new(50_00, 5.0, 0.5));
//!
//! let snapshot = AllocationAnalyzer::new(&market).analyze(&portfolio);
//! let strategy = RebalancingStrategy::new(
//!     "s-1",
//!     "drift-5",
//!     StrategyKind::Threshold(ThresholdParams { threshold_percent: 5.0 }),
//! );
//! let pricing = TradePricing::default();
//! let ctx = EvaluationContext { snapshot: &snapshot, strategy: &strategy, pricing: &pricing, now: Utc::now() };
//!
//! let trades = optimize_trades(evaluate(&ctx).trades, &strategy, &pricing);
//! // Equal priority (5 points each), so ties break by symbol.
//! assert_eq!(trades.len(), 2);
//! assert_eq!((trades[0].symbol, trades[0].action), (bnd, TradeAction::Buy));
//! assert_eq!((trades[1].symbol, trades[1].action), (spy, TradeAction::Sell));
//! ```
//!
//! ## Money and Weights
//!
//! Amounts are `i64` cents; weights are `f64` percent (`5.0` = 5%):
//!
//! ```
//! use driftbook::format_cents;
//!
//! assert_eq!(format_cents(100_50), "$100.50");
//! ```

pub mod analyzer;
mod error;
pub mod impact;
pub mod market;
pub mod optimize;
pub mod portfolio;
pub mod recommendation;
pub mod strategy;
mod types;

// Re-export public API
pub use analyzer::{AllocationAnalyzer, AllocationSnapshot};
pub use error::{MarketDataError, ValidationError};
pub use impact::{ImpactCoefficients, estimate_impact};
pub use market::{MarketDataPort, Quote, StaticMarketData};
pub use optimize::optimize_trades;
pub use portfolio::{AssetAllocation, AssetCategory, CostModel, Portfolio, TradePricing};
pub use recommendation::{
    EstimatedImpact, RebalanceRecommendation, TaxImplication, TradeAction, TradeRecommendation,
    Urgency,
};
pub use strategy::{
    CalendarParams, Constraints, Evaluation, EvaluationContext, Frequency, RebalancingStrategy,
    RiskParityParams, StrategyEvaluator, StrategyKind, StrategyParams, TacticalParams,
    ThresholdParams, VolatilityTargetParams, evaluate,
};
pub use types::{DRIFT_EPSILON, SYMBOL_CAPACITY, Symbol, format_cents, percent_of, value_at_percent};
