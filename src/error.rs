//! Error types for portfolio validation and market data access.

use crate::types::Symbol;

/// Structural problems with a portfolio, strategy, or recommendation.
///
/// Validation happens before any trade is attempted, so these are always
/// recoverable: nothing has been executed when one is returned.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("portfolio '{0}' not found")]
    UnknownPortfolio(String),

    #[error("strategy '{0}' not found")]
    UnknownStrategy(String),

    #[error("strategy '{0}' is disabled")]
    StrategyDisabled(String),

    #[error("duplicate allocation for {0}")]
    DuplicateSymbol(Symbol),

    #[error("target percents sum to {0:.4} (> 100)")]
    TargetSumExceeded(f64),

    #[error("{field} for {symbol} must be within [0, 100], got {value}")]
    PercentOutOfRange {
        symbol: Symbol,
        field: &'static str,
        value: f64,
    },

    #[error("{symbol}: min_percent {min} exceeds max_percent {max}")]
    InvertedBounds { symbol: Symbol, min: f64, max: f64 },

    #[error("{symbol}: quantity must be finite and non-negative, got {quantity}")]
    InvalidQuantity { symbol: Symbol, quantity: f64 },

    #[error("cash balance must be non-negative, got {0}")]
    NegativeCash(i64),

    #[error("invalid strategy parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("recommendation for portfolio '{0}' contains no trades")]
    EmptyRecommendation(String),

    #[error("trade {symbol} has non-positive share count {shares}")]
    InvalidTrade { symbol: Symbol, shares: f64 },

    #[error("market is closed; strategy requires market hours")]
    MarketClosed,
}

/// Errors returned by a [`MarketDataPort`](crate::market::MarketDataPort).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MarketDataError {
    #[error("symbol not found: {0}")]
    SymbolNotFound(Symbol),

    #[error("market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: Symbol, reason: String },
}

impl MarketDataError {
    /// The symbol the failed lookup was for.
    pub fn symbol(&self) -> Symbol {
        match self {
            MarketDataError::SymbolNotFound(symbol) => *symbol,
            MarketDataError::DataUnavailable { symbol, .. } => *symbol,
        }
    }
}
