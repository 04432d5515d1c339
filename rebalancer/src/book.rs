//! Book file (book.json) loading and validation.
//!
//! A book is the CLI's stand-in for a database and a market feed: the
//! portfolios, the strategies configured for each, and one quote per symbol.

use std::path::Path;

use driftbook::{Portfolio, Quote, RebalancingStrategy, StaticMarketData, Symbol};
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::store::InMemoryStore;

#[derive(Debug, Clone, Deserialize)]
pub struct Book {
    pub portfolios: Vec<Portfolio>,
    #[serde(default)]
    pub strategies: Vec<BookStrategy>,
    /// Quotes keyed by ticker.
    #[serde(default)]
    pub quotes: FxHashMap<String, Quote>,
}

/// A strategy plus the portfolio it belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct BookStrategy {
    pub portfolio_id: String,
    #[serde(flatten)]
    pub strategy: RebalancingStrategy,
}

impl Book {
    /// Load and validate a book file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::BookRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let book: Book = serde_json::from_str(json)?;
        book.validate()?;
        Ok(book)
    }

    fn validate(&self) -> Result<()> {
        if self.portfolios.is_empty() {
            return Err(Error::Book("portfolios list is empty".into()));
        }

        let mut ids = FxHashSet::default();
        for p in &self.portfolios {
            if !ids.insert(p.id.as_str()) {
                return Err(Error::Book(format!("duplicate portfolio id: {}", p.id)));
            }
            p.validate()?;
        }

        let mut strategy_ids = FxHashSet::default();
        for s in &self.strategies {
            if !ids.contains(s.portfolio_id.as_str()) {
                return Err(Error::Book(format!(
                    "strategy '{}' refers to unknown portfolio '{}'",
                    s.strategy.id, s.portfolio_id
                )));
            }
            if !strategy_ids.insert((s.portfolio_id.as_str(), s.strategy.id.as_str())) {
                return Err(Error::Book(format!(
                    "duplicate strategy id '{}' for portfolio '{}'",
                    s.strategy.id, s.portfolio_id
                )));
            }
            s.strategy.validate()?;
        }

        for (ticker, quote) in &self.quotes {
            if Symbol::try_new(ticker).is_none() {
                return Err(Error::Book(format!("invalid symbol '{ticker}'")));
            }
            if quote.price_cents <= 0 {
                return Err(Error::Book(format!(
                    "quote for {ticker} has non-positive price {}",
                    quote.price_cents
                )));
            }
        }

        for p in &self.portfolios {
            for a in &p.allocations {
                if !self.quotes.contains_key(a.symbol.as_str()) {
                    warn!("{}: no quote for {}; its drift will be unknown", p.id, a.symbol);
                }
            }
        }
        Ok(())
    }

    /// Quotes as (symbol, quote) pairs, sorted by symbol.
    pub fn quotes(&self) -> Vec<(Symbol, Quote)> {
        // Tickers were checked in validate().
        let mut out: Vec<(Symbol, Quote)> = self
            .quotes
            .iter()
            .filter_map(|(t, q)| Symbol::try_new(t).map(|s| (s, *q)))
            .collect();
        out.sort_by_key(|(s, _)| *s);
        out
    }

    pub fn market_data(&self) -> StaticMarketData {
        self.quotes()
            .into_iter()
            .fold(StaticMarketData::new(), |md, (s, q)| md.with_quote(s, q))
    }

    /// An in-memory store seeded with every portfolio and strategy.
    pub fn into_store(self) -> InMemoryStore {
        let store = self
            .portfolios
            .into_iter()
            .fold(InMemoryStore::new(), |store, p| store.with_portfolio(p));
        self.strategies
            .into_iter()
            .fold(store, |store, s| store.with_strategy(&s.portfolio_id, s.strategy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PortfolioStore;
    use driftbook::StrategyKind;

    fn example_json() -> &'static str {
        r#"{
            "portfolios": [{
                "id": "p-1",
                "owner_id": "alice",
                "cash_cents": 100000,
                "target_risk": 12.0,
                "allocations": [
                    {"symbol": "SPY", "category": "equity", "quantity": 13, "target_percent": 60},
                    {"symbol": "BND", "category": "fixed_income", "quantity": 50, "target_percent": 30,
                     "avg_cost_cents": 4800}
                ]
            }],
            "strategies": [
                {"portfolio_id": "p-1", "id": "s-1", "name": "drift-5",
                 "kind": {"type": "threshold", "threshold_percent": 5.0}},
                {"portfolio_id": "p-1", "id": "s-2", "name": "quarterly",
                 "kind": {"type": "calendar", "frequency": "quarterly"},
                 "enabled": false}
            ],
            "quotes": {
                "SPY": {"price_cents": 50000, "volatility": 20.0, "momentum": 5.0},
                "BND": {"price_cents": 5000, "volatility": 5.0, "momentum": 1.0}
            }
        }"#
    }

    #[test]
    fn parse_example_book() {
        let book = Book::from_json(example_json()).unwrap();
        assert_eq!(book.portfolios.len(), 1);
        assert_eq!(book.strategies.len(), 2);
        assert!(matches!(book.strategies[0].strategy.kind, StrategyKind::Threshold(_)));
        assert!(book.strategies[0].strategy.enabled);
        assert!(!book.strategies[1].strategy.enabled);
        assert_eq!(book.quotes()[0].0, Symbol::new("BND"));
    }

    #[test]
    fn store_and_market_from_book() {
        let book = Book::from_json(example_json()).unwrap();
        let md = book.market_data();
        let store = book.into_store();

        let p = store.load_portfolio("p-1").unwrap();
        assert_eq!(p.allocations.len(), 2);
        assert_eq!(store.load_strategies("p-1").unwrap().len(), 2);
        use driftbook::MarketDataPort;
        assert_eq!(md.quote(&Symbol::new("SPY")).unwrap().price_cents, 500_00);
    }

    #[test]
    fn demo_book_loads() {
        let book = Book::from_json(include_str!("../demo/book.json")).unwrap();
        assert_eq!(book.strategies.len(), 3);
        assert_eq!(book.quotes().len(), 3);
    }

    #[test]
    fn reject_target_sum_over_100() {
        let json = example_json().replace("\"target_percent\": 30", "\"target_percent\": 50");
        assert!(matches!(Book::from_json(&json), Err(Error::Validation(_))));
    }

    #[test]
    fn reject_orphan_strategy() {
        let json = example_json().replace(
            "\"portfolio_id\": \"p-1\", \"id\": \"s-1\"",
            "\"portfolio_id\": \"p-9\", \"id\": \"s-1\"",
        );
        assert!(matches!(Book::from_json(&json), Err(Error::Book(_))));
    }

    #[test]
    fn reject_bad_quote() {
        let json = example_json().replace("\"price_cents\": 5000,", "\"price_cents\": 0,");
        assert!(matches!(Book::from_json(&json), Err(Error::Book(_))));
    }

    #[test]
    fn reject_empty_portfolios() {
        assert!(matches!(
            Book::from_json(r#"{"portfolios": []}"#),
            Err(Error::Book(_))
        ));
    }

    #[test]
    fn reject_malformed_json() {
        assert!(matches!(Book::from_json("{"), Err(Error::BookParse(_))));
    }
}
