//! Rebalancing strategies and their evaluators.
//!
//! A [`RebalancingStrategy`] carries a [`StrategyKind`] tag holding the
//! type-specific parameters. Each parameter struct implements
//! [`StrategyEvaluator`], and [`evaluate`] dispatches with an exhaustive
//! `match`, so adding a variant is a compile error until it is handled.
//!
//! Evaluators are pure functions of the [`EvaluationContext`]: the analysis
//! snapshot, the strategy, trade pricing, and the evaluation time.

pub mod calendar;
pub mod risk_parity;
mod sizing;
pub mod tactical;
pub mod threshold;
pub mod volatility;

pub use calendar::{CalendarParams, Frequency};
pub use risk_parity::RiskParityParams;
pub use tactical::TacticalParams;
pub use threshold::ThresholdParams;
pub use volatility::VolatilityTargetParams;

use chrono::{DateTime, Utc};

use crate::analyzer::AllocationSnapshot;
use crate::error::ValidationError;
use crate::impact::ImpactCoefficients;
use crate::portfolio::TradePricing;
use crate::recommendation::{TradeRecommendation, Urgency};
use crate::types::Symbol;

/// Everything an evaluator may look at.
#[derive(Clone, Copy, Debug)]
pub struct EvaluationContext<'a> {
    pub snapshot: &'a AllocationSnapshot,
    pub strategy: &'a RebalancingStrategy,
    pub pricing: &'a TradePricing,
    pub now: DateTime<Utc>,
}

/// Provisional output of one strategy, before optimization.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub trades: Vec<TradeRecommendation>,
    pub reason: String,
    pub urgency: Urgency,
}

impl Evaluation {
    /// An evaluation that proposes nothing.
    pub fn idle(reason: impl Into<String>) -> Self {
        Self {
            trades: Vec::new(),
            reason: reason.into(),
            urgency: Urgency::Low,
        }
    }
}

/// A strategy variant's decision logic.
pub trait StrategyEvaluator {
    /// Propose trades for the snapshot in `ctx`.
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Evaluation;

    /// Reject malformed parameters before any evaluation.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// The closed set of strategy variants, tagged by `type`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum StrategyKind {
    Threshold(ThresholdParams),
    Calendar(CalendarParams),
    VolatilityTarget(VolatilityTargetParams),
    RiskParity(RiskParityParams),
    Tactical(TacticalParams),
}

impl StrategyKind {
    /// The evaluator for this variant.
    pub fn evaluator(&self) -> &dyn StrategyEvaluator {
        match self {
            StrategyKind::Threshold(p) => p,
            StrategyKind::Calendar(p) => p,
            StrategyKind::VolatilityTarget(p) => p,
            StrategyKind::RiskParity(p) => p,
            StrategyKind::Tactical(p) => p,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Threshold(_) => "threshold",
            StrategyKind::Calendar(_) => "calendar",
            StrategyKind::VolatilityTarget(_) => "volatility_target",
            StrategyKind::RiskParity(_) => "risk_parity",
            StrategyKind::Tactical(_) => "tactical",
        }
    }
}

/// Parameters shared by every strategy variant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StrategyParams {
    /// Trades below this notional are dropped (cents).
    pub min_trade_cents: i64,
    /// Cap on a single trade, as percent of total value.
    pub max_trade_percent: Option<f64>,
    /// Defer sells that would realise a gain.
    pub tax_optimized: bool,
    pub impact: ImpactCoefficients,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            min_trade_cents: 100_00,
            max_trade_percent: None,
            tax_optimized: false,
            impact: ImpactCoefficients::default(),
        }
    }
}

/// Execution constraints attached to a strategy.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Constraints {
    pub market_hours_only: bool,
    /// Maximum number of trades in one recommendation.
    pub max_daily_trades: usize,
    pub exclude_symbols: Vec<Symbol>,
    pub min_position_percent: Option<f64>,
    pub max_position_percent: Option<f64>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            market_hours_only: false,
            max_daily_trades: 50,
            exclude_symbols: Vec::new(),
            min_position_percent: None,
            max_position_percent: None,
        }
    }
}

impl Constraints {
    pub fn is_excluded(&self, symbol: &Symbol) -> bool {
        self.exclude_symbols.contains(symbol)
    }

    /// Clamp a desired weight to the position-size bounds.
    pub fn clamp_percent(&self, percent: f64) -> f64 {
        let lo = self.min_position_percent.unwrap_or(0.0);
        let hi = self.max_position_percent.unwrap_or(100.0);
        percent.max(lo).min(hi)
    }
}

/// A configured strategy, owned by the configuration store.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalancingStrategy {
    pub id: String,
    pub name: String,
    pub kind: StrategyKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: StrategyParams,
    #[cfg_attr(feature = "serde", serde(default))]
    pub constraints: Constraints,
    #[cfg_attr(feature = "serde", serde(default = "enabled_by_default"))]
    pub enabled: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub last_run: Option<DateTime<Utc>>,
}

#[cfg(feature = "serde")]
fn enabled_by_default() -> bool {
    true
}

impl RebalancingStrategy {
    /// A new enabled strategy with default params and constraints.
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: StrategyKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            params: StrategyParams::default(),
            constraints: Constraints::default(),
            enabled: true,
            last_run: None,
        }
    }

    pub fn with_params(mut self, params: StrategyParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_last_run(mut self, last_run: DateTime<Utc>) -> Self {
        self.last_run = Some(last_run);
        self
    }

    /// True when `key` is this strategy's id or name.
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.name == key
    }

    /// Validate shared and variant-specific parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.params.min_trade_cents < 0 {
            return Err(invalid(
                "min_trade_cents",
                format!("must be >= 0, got {}", self.params.min_trade_cents),
            ));
        }
        if let Some(pct) = self.params.max_trade_percent {
            if !(pct > 0.0 && pct <= 100.0) {
                return Err(invalid("max_trade_percent", format!("must be in (0, 100], got {pct}")));
            }
        }
        self.params.impact.validate()?;

        if self.constraints.max_daily_trades == 0 {
            return Err(invalid("max_daily_trades", "must be > 0".into()));
        }
        for (name, bound) in [
            ("min_position_percent", self.constraints.min_position_percent),
            ("max_position_percent", self.constraints.max_position_percent),
        ] {
            if let Some(v) = bound {
                if !(0.0..=100.0).contains(&v) {
                    return Err(invalid(name, format!("must be in [0, 100], got {v}")));
                }
            }
        }
        if let (Some(lo), Some(hi)) = (
            self.constraints.min_position_percent,
            self.constraints.max_position_percent,
        ) {
            if lo > hi {
                return Err(invalid(
                    "min_position_percent",
                    format!("{lo} exceeds max_position_percent {hi}"),
                ));
            }
        }

        self.kind.evaluator().validate()
    }
}

/// Run the strategy in `ctx` against its snapshot.
pub fn evaluate(ctx: &EvaluationContext<'_>) -> Evaluation {
    ctx.strategy.kind.evaluator().evaluate(ctx)
}

pub(crate) fn invalid(name: &'static str, reason: String) -> ValidationError {
    ValidationError::InvalidParameter { name, reason }
}

/// `value` must be finite and strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be finite and > 0, got {value}")))
    }
}
