// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! driftbook-rebalancer: rebalance orchestration and trade execution.
//!
//! [`RebalanceOrchestrator`] analyzes portfolios with their configured
//! strategies and executes a chosen recommendation through a
//! [`BrokerPort`](driftbook_broker::BrokerPort), one trade at a time, with
//! per-portfolio locking, cancellation, a JSONL audit trail, and persistence
//! through a [`PortfolioStore`].

pub mod audit;
pub mod book;
pub mod cancel;
pub mod config;
pub mod error;
pub mod execution;
pub mod lock;
pub mod orchestrator;
pub mod reconcile;
pub mod store;

pub use cancel::CancellationToken;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use execution::{ExecutionStatus, RebalanceExecution, TradeExecution, TradeStatus};
pub use lock::Phase;
pub use orchestrator::{ExecuteOptions, RebalanceOrchestrator, StrategySelection};
pub use store::{InMemoryStore, PortfolioStore, StoreError};
