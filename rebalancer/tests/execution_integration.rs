// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! Integration tests: analyze then execute through the orchestrator.

use std::sync::Arc;

use driftbook::{
    AssetAllocation, AssetCategory, Portfolio, Quote, RebalancingStrategy, StaticMarketData,
    StrategyKind, Symbol, ThresholdParams, TradeAction,
};
use driftbook_broker::BrokerSide;
use driftbook_broker::mock::MockBroker;
use driftbook_rebalancer::audit::AuditLog;
use driftbook_rebalancer::{
    CancellationToken, EngineConfig, Error, ExecuteOptions, ExecutionStatus, InMemoryStore,
    RebalanceOrchestrator, StrategySelection, TradeStatus,
};

fn spy() -> Symbol {
    Symbol::new("SPY")
}
fn bnd() -> Symbol {
    Symbol::new("BND")
}
fn vti() -> Symbol {
    Symbol::new("VTI")
}

fn market() -> StaticMarketData {
    StaticMarketData::new()
        .with_quote(spy(), Quote::new(500_00, 18.0, 4.0))
        .with_quote(bnd(), Quote::new(50_00, 5.0, 0.5))
        .with_quote(vti(), Quote::new(250_00, 17.0, 3.0))
}

/// $100,000 held 65 / 25 / 10 (SPY / BND / VTI).
fn portfolio(targets: [f64; 3]) -> Portfolio {
    Portfolio::new("p-1", "owner", 0)
        .with_allocation(AssetAllocation::new(spy(), AssetCategory::Equity, 130.0, targets[0]))
        .with_allocation(AssetAllocation::new(bnd(), AssetCategory::FixedIncome, 500.0, targets[1]))
        .with_allocation(AssetAllocation::new(vti(), AssetCategory::Equity, 40.0, targets[2]))
}

fn threshold(pct: f64) -> RebalancingStrategy {
    RebalancingStrategy::new(
        "s-threshold",
        "drift",
        StrategyKind::Threshold(ThresholdParams {
            threshold_percent: pct,
        }),
    )
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.execution.order_interval_ms = 0;
    config.execution.poll_interval_ms = 0;
    config
}

struct Harness {
    orchestrator: RebalanceOrchestrator,
    broker: Arc<MockBroker>,
    store: Arc<InMemoryStore>,
}

fn harness(targets: [f64; 3], broker: MockBroker) -> Harness {
    let broker = Arc::new(broker);
    let store = Arc::new(
        InMemoryStore::new()
            .with_portfolio(portfolio(targets))
            .with_strategy("p-1", threshold(5.0)),
    );
    let orchestrator = RebalanceOrchestrator::new(
        Arc::new(market()),
        broker.clone(),
        store.clone(),
        config(),
    )
    .unwrap();
    Harness {
        orchestrator,
        broker,
        store,
    }
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn end_to_end_threshold_rebalance() {
    let h = harness([60.0, 30.0, 10.0], MockBroker::builder().build());

    let mut recs = h.orchestrator.analyze("p-1", &StrategySelection::All).unwrap();
    assert_eq!(recs.len(), 1);
    let rec = recs.remove(0);
    let symbols: Vec<Symbol> = rec.trades.iter().map(|t| t.symbol).collect();
    assert!(symbols.contains(&spy()) && symbols.contains(&bnd()));
    assert!(!symbols.contains(&vti()));

    let exec = h
        .orchestrator
        .execute(rec, ExecuteOptions::default(), &CancellationToken::new())
        .unwrap();
    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.results.trades_executed, 2);
    assert!(exec.results.target_deviation < 1e-9);
    assert!(exec.completed_at.is_some());

    let orders = h.broker.submitted_orders();
    let spy_order = orders.iter().find(|o| o.symbol == spy()).unwrap();
    assert_eq!(spy_order.side, BrokerSide::Sell);
    assert_eq!(spy_order.quantity, 10.0);
    let bnd_order = orders.iter().find(|o| o.symbol == bnd()).unwrap();
    assert_eq!(bnd_order.side, BrokerSide::Buy);
    assert_eq!(bnd_order.quantity, 100.0);

    assert_eq!(h.store.executions().len(), 1);
}

// ============================================================================
// Partial failure
// ============================================================================

#[test]
fn second_of_three_trades_fails() {
    // 55 / 30 / 15 targets: every position drifts by at least 5 points
    let h = harness([55.0, 30.0, 15.0], MockBroker::builder().fail_on_call(2).build());

    let rec = h
        .orchestrator
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);
    assert_eq!(rec.trades.len(), 3);
    // SPY moves the most weight, so it goes first
    assert_eq!(rec.trades[0].symbol, spy());
    assert_eq!(rec.trades[0].action, TradeAction::Sell);

    let exec = h
        .orchestrator
        .execute(rec, ExecuteOptions::default(), &CancellationToken::new())
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.trades.len(), 3);
    assert_eq!(exec.results.trades_executed, 2);
    assert_eq!(exec.results.trades_failed, 1);
    assert_eq!(exec.errors.len(), 1);
    assert_eq!(exec.trades[1].status, TradeStatus::Failed);
    assert!((exec.results.improvement_score - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(h.broker.call_count(), 3);
}

#[test]
fn reordered_trades_still_run_highest_priority_first() {
    let h = harness([55.0, 30.0, 15.0], MockBroker::builder().build());
    let mut rec = h
        .orchestrator
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);
    rec.trades.reverse();
    assert_eq!(rec.trades[0].symbol, vti());

    let exec = h
        .orchestrator
        .execute(rec, ExecuteOptions::default(), &CancellationToken::new())
        .unwrap();

    let sent: Vec<Symbol> = h.broker.submitted_orders().iter().map(|o| o.symbol).collect();
    // SPY corrects 10 points; BND and VTI tie at 5 and go alphabetically
    assert_eq!(sent, [spy(), bnd(), vti()]);
    let recorded: Vec<Symbol> = exec.trades.iter().map(|t| t.symbol).collect();
    assert_eq!(recorded, sent);
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let mut config = config();
    config.market_hours.open_utc = "9am".into();
    let built = RebalanceOrchestrator::new(
        Arc::new(market()),
        Arc::new(MockBroker::builder().build()),
        Arc::new(InMemoryStore::new()),
        config,
    );
    assert!(matches!(built, Err(Error::Config(_))));
}

// ============================================================================
// Dry run, cancellation, outage
// ============================================================================

#[test]
fn dry_run_never_calls_broker() {
    let h = harness([60.0, 30.0, 10.0], MockBroker::builder().build());
    let rec = h
        .orchestrator
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);
    let trades = rec.trades.len();

    let exec = h
        .orchestrator
        .execute(rec, ExecuteOptions { dry_run: true }, &CancellationToken::new())
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert!(exec.dry_run);
    assert_eq!(exec.trades.len(), trades);
    assert!(exec.trades.iter().all(|t| t.status == TradeStatus::Filled));
    assert_eq!(h.broker.call_count(), 0);
    assert_eq!(h.broker.status_calls(), 0);
    assert!(h.store.executions().is_empty());
}

#[test]
fn cancelled_before_first_trade() {
    let h = harness([60.0, 30.0, 10.0], MockBroker::builder().build());
    let rec = h
        .orchestrator
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let exec = h
        .orchestrator
        .execute(rec, ExecuteOptions::default(), &cancel)
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert!(exec.trades.is_empty());
    assert_eq!(h.broker.call_count(), 0);
    assert!(exec.errors.iter().any(|e| e.contains("cancelled")));
}

#[test]
fn store_outage_fails_execution_without_trades() {
    let h = harness([60.0, 30.0, 10.0], MockBroker::builder().build());
    let rec = h
        .orchestrator
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);

    h.store.set_offline(true);
    let exec = h
        .orchestrator
        .execute(rec, ExecuteOptions::default(), &CancellationToken::new())
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Failed);
    assert!(exec.trades.is_empty());
    assert_eq!(exec.results.trades_executed, 0);
    assert!(!exec.errors.is_empty());
    assert_eq!(h.broker.call_count(), 0);
}

#[test]
fn rejected_orders_still_complete() {
    use driftbook_broker::mock::FillMode;

    let h = harness(
        [60.0, 30.0, 10.0],
        MockBroker::builder().fill_mode(FillMode::Reject).build(),
    );
    let rec = h
        .orchestrator
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);
    let exec = h
        .orchestrator
        .execute(rec, ExecuteOptions::default(), &CancellationToken::new())
        .unwrap();

    assert_eq!(exec.status, ExecutionStatus::Completed);
    assert_eq!(exec.results.trades_executed, 0);
    assert_eq!(exec.errors.len(), 2);
    // nothing filled, so the drift is unchanged: |+5| and |-5| and 0
    assert!((exec.results.target_deviation - 10.0 / 3.0).abs() < 1e-9);
}

// ============================================================================
// Audit trail
// ============================================================================

#[test]
fn audit_trail_records_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("audit.jsonl");

    let store = InMemoryStore::new()
        .with_portfolio(portfolio([60.0, 30.0, 10.0]))
        .with_strategy("p-1", threshold(5.0));
    let orchestrator = RebalanceOrchestrator::new(
        Arc::new(market()),
        Arc::new(MockBroker::builder().build()),
        Arc::new(store),
        config(),
    )
    .unwrap()
    .with_audit(AuditLog::open(&path).unwrap());

    let rec = orchestrator
        .analyze("p-1", &StrategySelection::All)
        .unwrap()
        .remove(0);
    orchestrator
        .execute(rec, ExecuteOptions::default(), &CancellationToken::new())
        .unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let events: Vec<String> = contents
        .lines()
        .map(|l| {
            let v: serde_json::Value = serde_json::from_str(l).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(
        events,
        vec![
            "analysis_completed",
            "execution_started",
            "trade_attempted",
            "trade_attempted",
            "execution_finished",
        ]
    );
}
