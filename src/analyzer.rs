//! Allocation analysis: live values, weights, drift, and aggregate volatility.
//!
//! The analyzer never mutates the stored portfolio. Each call returns a fresh
//! [`AllocationSnapshot`] holding an updated copy plus the quotes it used, so
//! strategy evaluation downstream is a pure function of the snapshot.

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::error::MarketDataError;
use crate::market::{MarketDataPort, Quote};
use crate::portfolio::{AssetAllocation, Portfolio};
use crate::types::{Symbol, percent_of};

/// Result of one analysis pass.
#[derive(Clone, Debug)]
pub struct AllocationSnapshot {
    /// Portfolio copy with refreshed values, percents, drift, and total.
    pub portfolio: Portfolio,
    /// Quotes for every symbol that priced successfully.
    pub quotes: FxHashMap<Symbol, Quote>,
    /// Symbols whose market data was unavailable; their drift is unknown.
    pub unavailable: Vec<Symbol>,
    /// Value-weighted volatility of the whole portfolio (percent).
    pub aggregate_volatility: f64,
}

impl AllocationSnapshot {
    #[inline]
    pub fn total_value_cents(&self) -> i64 {
        self.portfolio.total_value_cents
    }

    pub fn quote(&self, symbol: &Symbol) -> Option<&Quote> {
        self.quotes.get(symbol)
    }

    /// Allocations with a known price, paired with their quote.
    pub fn priced(&self) -> impl Iterator<Item = (&AssetAllocation, &Quote)> + '_ {
        self.portfolio
            .allocations
            .iter()
            .filter(|a| a.is_priced())
            .filter_map(|a| self.quotes.get(&a.symbol).map(|q| (a, q)))
    }

    /// The priced allocation with the largest absolute drift.
    pub fn max_abs_drift(&self) -> Option<(Symbol, f64)> {
        self.portfolio
            .allocations
            .iter()
            .filter_map(|a| a.drift.map(|d| (a.symbol, d.abs())))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Computes drift and risk figures from a portfolio and a market data source.
pub struct AllocationAnalyzer<M> {
    market: M,
}

impl<M: MarketDataPort> AllocationAnalyzer<M> {
    pub fn new(market: M) -> Self {
        Self { market }
    }

    /// Analyze `portfolio` against current market data.
    ///
    /// A symbol whose quote cannot be fetched keeps its last stored value
    /// (so the total stays comparable) but gets `drift = None` and is left
    /// out of aggregate volatility.
    pub fn analyze(&self, portfolio: &Portfolio) -> AllocationSnapshot {
        let mut snapshot = portfolio.clone();
        let mut quotes = FxHashMap::default();
        let mut unavailable = Vec::new();

        for allocation in &mut snapshot.allocations {
            match self.fetch(&allocation.symbol) {
                Ok(quote) => {
                    allocation.current_value_cents =
                        (allocation.quantity * quote.price_cents as f64).round() as i64;
                    quotes.insert(allocation.symbol, quote);
                }
                Err(e) => {
                    warn!("{}: {e}; drift unknown, excluded from triggers", allocation.symbol);
                    unavailable.push(allocation.symbol);
                }
            }
        }

        let invested: i64 = snapshot
            .allocations
            .iter()
            .map(|a| a.current_value_cents)
            .sum();
        let total = snapshot.cash_cents + invested;
        snapshot.total_value_cents = total;

        let mut aggregate_volatility = 0.0_f64;
        for allocation in &mut snapshot.allocations {
            allocation.current_percent = percent_of(allocation.current_value_cents, total);
            match quotes.get(&allocation.symbol) {
                Some(quote) => {
                    allocation.drift = Some(allocation.current_percent - allocation.target_percent);
                    aggregate_volatility += allocation.current_percent / 100.0 * quote.volatility;
                }
                None => allocation.drift = None,
            }
        }

        debug!(
            "analyzed portfolio {}: total={} aggregate_vol={:.2}% unavailable={}",
            snapshot.id,
            total,
            aggregate_volatility,
            unavailable.len()
        );

        AllocationSnapshot {
            portfolio: snapshot,
            quotes,
            unavailable,
            aggregate_volatility,
        }
    }

    fn fetch(&self, symbol: &Symbol) -> Result<Quote, MarketDataError> {
        let quote = self.market.quote(symbol)?;
        if quote.price_cents <= 0 || !quote.volatility.is_finite() || !quote.momentum.is_finite() {
            return Err(MarketDataError::DataUnavailable {
                symbol: *symbol,
                reason: format!("unusable quote (price {} cents)", quote.price_cents),
            });
        }
        Ok(quote)
    }
}
