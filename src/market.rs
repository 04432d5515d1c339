//! Market data port: price, volatility, and momentum per symbol.

use std::sync::RwLock;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::MarketDataError;
use crate::types::Symbol;

/// A market data snapshot for one instrument.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quote {
    /// Last price (cents).
    pub price_cents: i64,
    /// Trailing annualised volatility (percent).
    pub volatility: f64,
    /// Trailing return used as a momentum signal (percent).
    pub momentum: f64,
}

impl Quote {
    pub fn new(price_cents: i64, volatility: f64, momentum: f64) -> Self {
        Self {
            price_cents,
            volatility,
            momentum,
        }
    }
}

/// Source of current market data.
///
/// Implementations may block (network, cache). A lookup failure for one
/// symbol must not affect lookups for others.
pub trait MarketDataPort {
    fn quote(&self, symbol: &Symbol) -> Result<Quote, MarketDataError>;
}

impl<T: MarketDataPort + ?Sized> MarketDataPort for &T {
    fn quote(&self, symbol: &Symbol) -> Result<Quote, MarketDataError> {
        (**self).quote(symbol)
    }
}

impl<T: MarketDataPort + ?Sized> MarketDataPort for std::sync::Arc<T> {
    fn quote(&self, symbol: &Symbol) -> Result<Quote, MarketDataError> {
        (**self).quote(symbol)
    }
}

/// In-memory market data, updatable at runtime.
///
/// Used by tests and by the CLI when quotes come from a file.
#[derive(Debug, Default)]
pub struct StaticMarketData {
    quotes: RwLock<FxHashMap<Symbol, Quote>>,
    unavailable: RwLock<FxHashSet<Symbol>>,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, symbol: Symbol, quote: Quote) -> Self {
        self.set_quote(symbol, quote);
        self
    }

    pub fn set_quote(&self, symbol: Symbol, quote: Quote) {
        if let Ok(mut quotes) = self.quotes.write() {
            quotes.insert(symbol, quote);
        }
    }

    /// Make lookups for `symbol` fail with `DataUnavailable` until
    /// [`restore`](Self::restore) is called.
    pub fn mark_unavailable(&self, symbol: Symbol) {
        if let Ok(mut set) = self.unavailable.write() {
            set.insert(symbol);
        }
    }

    pub fn restore(&self, symbol: &Symbol) {
        if let Ok(mut set) = self.unavailable.write() {
            set.remove(symbol);
        }
    }
}

impl MarketDataPort for StaticMarketData {
    fn quote(&self, symbol: &Symbol) -> Result<Quote, MarketDataError> {
        let stale = self
            .unavailable
            .read()
            .map(|set| set.contains(symbol))
            .unwrap_or(true);
        if stale {
            return Err(MarketDataError::DataUnavailable {
                symbol: *symbol,
                reason: "feed unavailable".into(),
            });
        }
        self.quotes
            .read()
            .ok()
            .and_then(|quotes| quotes.get(symbol).copied())
            .ok_or(MarketDataError::SymbolNotFound(*symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_missing() {
        let md = StaticMarketData::new().with_quote(Symbol::new("SPY"), Quote::new(500_00, 15.0, 4.0));
        assert_eq!(md.quote(&Symbol::new("SPY")).unwrap().price_cents, 500_00);
        assert_eq!(
            md.quote(&Symbol::new("XYZ")),
            Err(MarketDataError::SymbolNotFound(Symbol::new("XYZ")))
        );
    }

    #[test]
    fn unavailable_then_restored() {
        let spy = Symbol::new("SPY");
        let md = StaticMarketData::new().with_quote(spy, Quote::new(500_00, 15.0, 4.0));
        md.mark_unavailable(spy);
        assert!(matches!(
            md.quote(&spy),
            Err(MarketDataError::DataUnavailable { .. })
        ));
        md.restore(&spy);
        assert!(md.quote(&spy).is_ok());
    }

    #[test]
    fn set_quote_overwrites() {
        let spy = Symbol::new("SPY");
        let md = StaticMarketData::new().with_quote(spy, Quote::new(500_00, 15.0, 4.0));
        md.set_quote(spy, Quote::new(510_00, 15.0, 4.0));
        assert_eq!(md.quote(&spy).unwrap().price_cents, 510_00);
    }
}
