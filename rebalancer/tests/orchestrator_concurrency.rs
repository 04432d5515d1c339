// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! One execution per portfolio; analysis keeps running alongside it.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use driftbook::{
    AssetAllocation, AssetCategory, Portfolio, Quote, RebalancingStrategy, StaticMarketData,
    StrategyKind, Symbol, ThresholdParams,
};
use driftbook_broker::mock::MockBroker;
use driftbook_rebalancer::{
    CancellationToken, EngineConfig, Error, ExecuteOptions, ExecutionStatus, InMemoryStore, Phase,
    RebalanceOrchestrator, StrategySelection,
};

fn spy() -> Symbol {
    Symbol::new("SPY")
}
fn bnd() -> Symbol {
    Symbol::new("BND")
}

fn orchestrator(latency: Duration) -> (Arc<RebalanceOrchestrator>, Arc<MockBroker>) {
    let market = StaticMarketData::new()
        .with_quote(spy(), Quote::new(500_00, 20.0, 5.0))
        .with_quote(bnd(), Quote::new(50_00, 5.0, 1.0));
    let store = InMemoryStore::new()
        .with_portfolio(
            Portfolio::new("p-1", "owner", 1_000_00)
                .with_allocation(AssetAllocation::new(spy(), AssetCategory::Equity, 13.0, 60.0))
                .with_allocation(AssetAllocation::new(bnd(), AssetCategory::FixedIncome, 50.0, 30.0)),
        )
        .with_portfolio(
            Portfolio::new("p-2", "owner", 1_000_00)
                .with_allocation(AssetAllocation::new(spy(), AssetCategory::Equity, 13.0, 60.0))
                .with_allocation(AssetAllocation::new(bnd(), AssetCategory::FixedIncome, 50.0, 30.0)),
        )
        .with_strategy("p-1", threshold())
        .with_strategy("p-2", threshold());
    let broker = Arc::new(MockBroker::builder().latency(latency).build());

    let mut config = EngineConfig::default();
    config.execution.order_interval_ms = 0;
    config.execution.poll_interval_ms = 0;
    let orchestrator = RebalanceOrchestrator::new(
        Arc::new(market),
        broker.clone(),
        Arc::new(store),
        config,
    )
    .unwrap();
    (Arc::new(orchestrator), broker)
}

fn threshold() -> RebalancingStrategy {
    RebalancingStrategy::new(
        "s-5",
        "drift-5",
        StrategyKind::Threshold(ThresholdParams {
            threshold_percent: 5.0,
        }),
    )
}

#[test]
fn orchestrator_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RebalanceOrchestrator>();
}

#[test]
fn concurrent_execute_on_same_portfolio_is_rejected() {
    let (orch, _broker) = orchestrator(Duration::from_millis(150));
    let rec = orch
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);

    let first = {
        let orch = Arc::clone(&orch);
        let rec = rec.clone();
        thread::spawn(move || orch.execute(rec, ExecuteOptions::default(), &CancellationToken::new()))
    };

    // Wait for the first execution to take the lock.
    while orch.phase("p-1") != Phase::Executing {
        thread::sleep(Duration::from_millis(1));
    }

    let second = orch.execute(rec, ExecuteOptions::default(), &CancellationToken::new());
    assert!(matches!(second, Err(Error::ConcurrentExecution(ref id)) if id == "p-1"));

    // Analysis is read-only and still allowed.
    assert!(!orch.analyze("p-1", &StrategySelection::All).unwrap().is_empty());

    let exec = first.join().unwrap().unwrap();
    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(orch.phase("p-1"), Phase::Idle);
}

#[test]
fn different_portfolios_execute_in_parallel() {
    let (orch, broker) = orchestrator(Duration::from_millis(20));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["p-1", "p-2"]
        .into_iter()
        .map(|id| {
            let orch = Arc::clone(&orch);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let rec = orch.analyze(id, &StrategySelection::All).unwrap().remove(0);
                barrier.wait();
                orch.execute(rec, ExecuteOptions::default(), &CancellationToken::new())
            })
        })
        .collect();

    for h in handles {
        let exec = h.join().unwrap().unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
    }
    assert_eq!(broker.call_count(), 4);
}

#[test]
fn lock_released_after_execution() {
    let (orch, _broker) = orchestrator(Duration::ZERO);
    for _ in 0..2 {
        let rec = orch
            .analyze("p-1", &StrategySelection::All)
            .unwrap()
            .remove(0);
        let exec = orch
            .execute(rec, ExecuteOptions { dry_run: true }, &CancellationToken::new())
            .unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
    }
}

#[test]
fn cancel_from_another_thread_stops_remaining_trades() {
    let (orch, broker) = orchestrator(Duration::from_millis(100));
    let rec = orch
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);
    assert_eq!(rec.trades.len(), 2);

    let cancel = CancellationToken::new();
    let handle = {
        let orch = Arc::clone(&orch);
        let cancel = cancel.clone();
        thread::spawn(move || orch.execute(rec, ExecuteOptions::default(), &cancel))
    };

    // Cancel while the first order is in flight.
    while broker.call_count() == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    cancel.cancel();

    let exec = handle.join().unwrap().unwrap();
    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert_eq!(exec.trades.len(), 1);
    assert_eq!(exec.results.trades_executed, 1);
    assert_eq!(broker.call_count(), 1);
}
