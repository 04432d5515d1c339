//! Mock broker for testing: implements [`BrokerPort`] with scriptable behavior.
//!
//! Use this in integration tests to simulate broker responses without network
//! calls, and as a paper broker from the CLI.
//!
//! ```
//! use driftbook::Symbol;
//! use driftbook_broker::mock::{FillMode, MockBroker};
//! use driftbook_broker::{BrokerOrder, BrokerOrderType, BrokerPort, BrokerSide, OrderState, TimeInForce};
//!
//! let broker = MockBroker::builder()
//!     .fill_mode(FillMode::ImmediateFull)
//!     .with_price(Symbol::new("SPY"), 500_00)
//!     .build();
//!
//! let ack = broker
//!     .place_order(&BrokerOrder {
//!         symbol: Symbol::new("SPY"),
//!         side: BrokerSide::Buy,
//!         quantity: 10.0,
//!         order_type: BrokerOrderType::Market,
//!         time_in_force: TimeInForce::Day,
//!     })
//!     .unwrap();
//! assert_eq!(ack.state, OrderState::Filled);
//! assert_eq!(ack.avg_fill_price_cents, Some(500_00));
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use driftbook::Symbol;
use log::debug;

use crate::BrokerPort;
use crate::error::BrokerError;
use crate::types::*;

/// How the mock broker handles submitted orders.
#[derive(Clone, Debug, PartialEq)]
pub enum FillMode {
    /// Orders fill completely on placement.
    ImmediateFull,
    /// The given fraction fills (e.g. 0.5 = 50%) and the rest is cancelled.
    ImmediatePartial(f64),
    /// Orders rest as `Submitted` for this many status polls, then fill.
    Resting { polls: u32 },
    /// Orders are acknowledged, then reported `Rejected`.
    Reject,
}

/// A recorded order submission for assertion in tests.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedOrder {
    pub symbol: Symbol,
    pub side: BrokerSide,
    pub quantity: f64,
    pub order_type: BrokerOrderType,
    pub time_in_force: TimeInForce,
}

/// Builder for `MockBroker`.
pub struct MockBrokerBuilder {
    fill_mode: FillMode,
    prices: Vec<(Symbol, i64)>,
    fail_calls: Vec<usize>,
    fail_symbols: Vec<Symbol>,
    latency: Duration,
}

impl MockBrokerBuilder {
    pub fn fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    /// Fill price for market orders on `symbol`. Limit orders fill at their limit.
    pub fn with_price(mut self, symbol: Symbol, price_cents: i64) -> Self {
        self.prices.push((symbol, price_cents));
        self
    }

    /// Make the `n`th `place_order` call (1-based) fail with a connection error.
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_calls.push(n);
        self
    }

    /// Reject every order for `symbol` with an order error.
    pub fn fail_symbol(mut self, symbol: Symbol) -> Self {
        self.fail_symbols.push(symbol);
        self
    }

    /// Sleep this long inside every `place_order` call.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn build(self) -> MockBroker {
        MockBroker {
            fill_mode: self.fill_mode,
            prices: self.prices,
            fail_calls: self.fail_calls,
            fail_symbols: self.fail_symbols,
            latency: self.latency,
            state: Mutex::new(MockState::default()),
        }
    }
}

#[derive(Default)]
struct MockState {
    place_calls: usize,
    status_calls: usize,
    next_order_id: u64,
    submitted: Vec<RecordedOrder>,
    live: Vec<LiveOrder>,
}

struct LiveOrder {
    id: OrderId,
    quantity: f64,
    fill_price: Option<i64>,
    polls_left: u32,
}

/// A mock broker that records submitted orders and returns configurable responses.
pub struct MockBroker {
    fill_mode: FillMode,
    prices: Vec<(Symbol, i64)>,
    fail_calls: Vec<usize>,
    fail_symbols: Vec<Symbol>,
    latency: Duration,
    state: Mutex<MockState>,
}

impl MockBroker {
    pub fn builder() -> MockBrokerBuilder {
        MockBrokerBuilder {
            fill_mode: FillMode::ImmediateFull,
            prices: Vec::new(),
            fail_calls: Vec::new(),
            fail_symbols: Vec::new(),
            latency: Duration::ZERO,
        }
    }

    /// All orders that were submitted, including failed calls.
    pub fn submitted_orders(&self) -> Vec<RecordedOrder> {
        self.state().submitted.clone()
    }

    /// Number of `place_order` calls so far.
    pub fn call_count(&self) -> usize {
        self.state().place_calls
    }

    /// Number of `order_status` calls so far.
    pub fn status_calls(&self) -> usize {
        self.state().status_calls
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fill_price(&self, order: &BrokerOrder) -> Option<i64> {
        match order.order_type {
            BrokerOrderType::Limit(price) => Some(price),
            BrokerOrderType::Market => self
                .prices
                .iter()
                .find(|(s, _)| *s == order.symbol)
                .map(|(_, p)| *p),
        }
    }

    fn ack(&self, live: &LiveOrder) -> OrderAck {
        let (state, filled) = match &self.fill_mode {
            FillMode::ImmediateFull => (OrderState::Filled, live.quantity),
            FillMode::ImmediatePartial(frac) => {
                let filled = (live.quantity * frac.clamp(0.0, 1.0) * 10_000.0).floor() / 10_000.0;
                (OrderState::Cancelled, filled)
            }
            FillMode::Resting { .. } if live.polls_left > 0 => (OrderState::Submitted, 0.0),
            FillMode::Resting { .. } => (OrderState::Filled, live.quantity),
            FillMode::Reject => (OrderState::Rejected, 0.0),
        };
        OrderAck {
            order_id: live.id.clone(),
            state,
            filled_quantity: filled,
            avg_fill_price_cents: if filled > 0.0 { live.fill_price } else { None },
            message: (state == OrderState::Rejected).then(|| "mock: order rejected".to_string()),
        }
    }
}

impl BrokerPort for MockBroker {
    fn place_order(&self, order: &BrokerOrder) -> Result<OrderAck, BrokerError> {
        let call = {
            let mut state = self.state();
            state.place_calls += 1;
            state.submitted.push(RecordedOrder {
                symbol: order.symbol,
                side: order.side,
                quantity: order.quantity,
                order_type: order.order_type,
                time_in_force: order.time_in_force,
            });
            state.place_calls
        };
        // The call is visible to observers while it is in flight.
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }

        if self.fail_calls.contains(&call) {
            return Err(BrokerError::Connection(format!("mock: injected failure on call {call}")));
        }
        if self.fail_symbols.contains(&order.symbol) {
            return Err(BrokerError::Order(format!("mock: {} not tradable", order.symbol)));
        }
        if !(order.quantity.is_finite() && order.quantity > 0.0) {
            return Err(BrokerError::Order(format!("mock: bad quantity {}", order.quantity)));
        }

        let mut state = self.state();
        state.next_order_id += 1;
        let live = LiveOrder {
            id: OrderId(format!("MOCK-{}", state.next_order_id)),
            quantity: order.quantity,
            fill_price: self.fill_price(order),
            polls_left: match self.fill_mode {
                FillMode::Resting { polls } => polls,
                _ => 0,
            },
        };
        let ack = match self.fill_mode {
            // Resting orders are only ever "submitted" on placement.
            FillMode::Resting { .. } => OrderAck {
                order_id: live.id.clone(),
                state: OrderState::Submitted,
                filled_quantity: 0.0,
                avg_fill_price_cents: None,
                message: None,
            },
            _ => self.ack(&live),
        };
        debug!(
            "mock: {} {} {} -> {} {:?}",
            order.side, order.quantity, order.symbol, ack.order_id, ack.state
        );
        state.live.push(live);
        Ok(ack)
    }

    fn order_status(&self, id: &OrderId) -> Result<OrderAck, BrokerError> {
        let mut state = self.state();
        state.status_calls += 1;
        let live = state
            .live
            .iter_mut()
            .find(|o| o.id == *id)
            .ok_or_else(|| BrokerError::UnknownOrder(id.to_string()))?;
        live.polls_left = live.polls_left.saturating_sub(1);
        let ack = self.ack(live);
        Ok(ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spy() -> Symbol {
        Symbol::new("SPY")
    }

    fn order(quantity: f64, order_type: BrokerOrderType) -> BrokerOrder {
        BrokerOrder {
            symbol: spy(),
            side: BrokerSide::Buy,
            quantity,
            order_type,
            time_in_force: TimeInForce::Day,
        }
    }

    #[test]
    fn submit_records_orders() {
        let broker = MockBroker::builder().build();
        let ack = broker.place_order(&order(50.0, BrokerOrderType::Limit(150_00))).unwrap();
        assert_eq!(ack.order_id, OrderId("MOCK-1".into()));
        assert_eq!(ack.avg_fill_price_cents, Some(150_00));

        let recorded = broker.submitted_orders();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].symbol, spy());
        assert_eq!(recorded[0].quantity, 50.0);
        assert_eq!(broker.call_count(), 1);
    }

    #[test]
    fn market_fill_uses_configured_price() {
        let broker = MockBroker::builder().with_price(spy(), 501_25).build();
        let ack = broker.place_order(&order(1.0, BrokerOrderType::Market)).unwrap();
        assert_eq!(ack.avg_fill_price_cents, Some(501_25));
    }

    #[test]
    fn reject_mode() {
        let broker = MockBroker::builder().fill_mode(FillMode::Reject).build();
        let ack = broker.place_order(&order(5.0, BrokerOrderType::Market)).unwrap();
        assert_eq!(ack.state, OrderState::Rejected);
        assert_eq!(ack.filled_quantity, 0.0);
        assert!(ack.message.is_some());
    }

    #[test]
    fn partial_fill_cancels_remainder() {
        let broker = MockBroker::builder()
            .fill_mode(FillMode::ImmediatePartial(0.5))
            .build();
        let ack = broker.place_order(&order(10.0, BrokerOrderType::Limit(100_00))).unwrap();
        assert_eq!(ack.state, OrderState::Cancelled);
        assert_eq!(ack.filled_quantity, 5.0);
    }

    #[test]
    fn resting_fills_after_polls() {
        let broker = MockBroker::builder()
            .fill_mode(FillMode::Resting { polls: 2 })
            .build();
        let ack = broker.place_order(&order(3.0, BrokerOrderType::Limit(10_00))).unwrap();
        assert_eq!(ack.state, OrderState::Submitted);

        let s1 = broker.order_status(&ack.order_id).unwrap();
        assert_eq!(s1.state, OrderState::Submitted);
        let s2 = broker.order_status(&ack.order_id).unwrap();
        assert_eq!(s2.state, OrderState::Filled);
        assert_eq!(s2.filled_quantity, 3.0);
        assert_eq!(broker.status_calls(), 2);
    }

    #[test]
    fn injected_failures() {
        let broker = MockBroker::builder()
            .fail_on_call(2)
            .fail_symbol(Symbol::new("GME"))
            .build();
        assert!(broker.place_order(&order(1.0, BrokerOrderType::Market)).is_ok());
        assert!(matches!(
            broker.place_order(&order(1.0, BrokerOrderType::Market)),
            Err(BrokerError::Connection(_))
        ));
        assert!(broker.place_order(&order(1.0, BrokerOrderType::Market)).is_ok());

        let mut gme = order(1.0, BrokerOrderType::Market);
        gme.symbol = Symbol::new("GME");
        assert!(matches!(broker.place_order(&gme), Err(BrokerError::Order(_))));
        assert_eq!(broker.call_count(), 4);
    }

    #[test]
    fn unknown_order_status() {
        let broker = MockBroker::builder().build();
        assert!(matches!(
            broker.order_status(&OrderId("nope".into())),
            Err(BrokerError::UnknownOrder(_))
        ));
    }
}
