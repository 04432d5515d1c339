// Allow our dollar.cents digit grouping convention (e.g., 100_00 = $100.00)
#![allow(clippy::inconsistent_digit_grouping)]

//! Brokerage port for driftbook.
//!
//! Provides the [`BrokerPort`] trait the execution engine submits orders
//! through, the order and acknowledgement types it speaks, and a scriptable
//! [`MockBroker`](mock::MockBroker) for tests and paper trading.
//!
//! The port is deliberately small: place an order, then poll its status
//! until it reaches a terminal state. Retries are the caller's decision.

pub mod error;
pub mod mock;
pub mod types;

pub use error::BrokerError;
pub use types::*;

use std::sync::Arc;

/// A brokerage that accepts orders and reports their fills.
///
/// Calls may block. Implementations shared across threads must be
/// `Send + Sync`; methods take `&self`.
pub trait BrokerPort {
    /// Submit an order. The returned ack may already be terminal.
    fn place_order(&self, order: &BrokerOrder) -> Result<OrderAck, BrokerError>;

    /// Current state of a previously placed order.
    fn order_status(&self, id: &OrderId) -> Result<OrderAck, BrokerError>;
}

impl<T: BrokerPort + ?Sized> BrokerPort for &T {
    fn place_order(&self, order: &BrokerOrder) -> Result<OrderAck, BrokerError> {
        (**self).place_order(order)
    }

    fn order_status(&self, id: &OrderId) -> Result<OrderAck, BrokerError> {
        (**self).order_status(id)
    }
}

impl<T: BrokerPort + ?Sized> BrokerPort for Arc<T> {
    fn place_order(&self, order: &BrokerOrder) -> Result<OrderAck, BrokerError> {
        (**self).place_order(order)
    }

    fn order_status(&self, id: &OrderId) -> Result<OrderAck, BrokerError> {
        (**self).order_status(id)
    }
}
