//! Shared broker types: orders, order ids, acknowledgements.

use std::fmt;

use driftbook::Symbol;

/// Order to submit to a broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerOrder {
    pub symbol: Symbol,
    pub side: BrokerSide,
    /// Shares; fractional quantities are allowed.
    pub quantity: f64,
    pub order_type: BrokerOrderType,
    pub time_in_force: TimeInForce,
}

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerSide {
    Buy,
    Sell,
}

impl fmt::Display for BrokerSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokerSide::Buy => f.pad("BUY"),
            BrokerSide::Sell => f.pad("SELL"),
        }
    }
}

/// Market or limit order. Limit prices are in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerOrderType {
    Market,
    Limit(i64),
}

/// How long an order stays working.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TimeInForce {
    /// Expires at the end of the trading day.
    #[default]
    Day,
    /// Good till cancelled.
    Gtc,
    /// Immediate or cancel: unfilled remainder is cancelled at once.
    Ioc,
}

/// Opaque order ID returned by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderState {
    /// No further fills will happen in a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected | OrderState::Expired
        )
    }
}

/// Broker's view of an order after placement or a status poll.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub state: OrderState,
    pub filled_quantity: f64,
    /// Volume-weighted fill price (cents); `None` until something fills.
    pub avg_fill_price_cents: Option<i64>,
    /// Broker-supplied text, e.g. a rejection reason.
    pub message: Option<String>,
}
