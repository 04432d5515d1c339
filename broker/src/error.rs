//! Broker error types.

/// Errors that can occur during broker operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("order error: {0}")]
    Order(String),

    #[error("unknown order id: {0}")]
    UnknownOrder(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("{0}")]
    Other(String),
}
