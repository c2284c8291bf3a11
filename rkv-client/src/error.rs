//! # Client Errors
//!
//! Every failure surfaced to callers is an [`Error`]. Variants name the
//! operation that failed and keep the underlying cause as their source, so
//! callers can walk the chain down to the `redis` error when they need to.

use thiserror::Error;

use crate::context::Cancelled;

/// Result type for the client.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for the connection pool.
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Errors surfaced by the service and its command facade.
#[derive(Debug, Error)]
pub enum Error {
    /// The context was already done before the operation started.
    #[error("{op} has context error: {reason}")]
    Cancelled {
        op: &'static str,
        #[source]
        reason: Cancelled,
    },

    /// A connection could not be obtained from the pool.
    #[error("connection setup for {op} has failed: {source}")]
    Connection {
        op: &'static str,
        #[source]
        source: PoolError,
    },

    /// The service was shut down.
    #[error("{op} has failed: service is closed")]
    Closed { op: &'static str },

    /// `get` found no value stored under the key.
    #[error("value does not exist for key {key:?}")]
    NotFound { key: String },

    /// Transport or protocol failure while executing a command.
    #[error("{op} command has failed: {source}")]
    Command {
        op: &'static str,
        #[source]
        source: redis::RedisError,
    },

    /// Endpoint could not be parsed into a host and port.
    #[error("invalid address {addr:?}")]
    InvalidAddress { addr: String },

    /// A configuration value could not be parsed.
    #[error("invalid value {value:?} for {name}")]
    InvalidConfig { name: &'static str, value: String },
}

impl Error {
    /// True when `get` found no value for the key.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True when the operation ran against a shut down service.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed { .. })
    }

    /// True when the context stopped the operation before it started.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

/// Errors raised while checking connections out of the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// `close` already ran on this pool.
    #[error("connection pool is closed")]
    Closed,

    /// `max_active` connections are already open.
    #[error("connection pool exhausted ({max_active} connections open)")]
    Exhausted { max_active: usize },

    /// The context deadline passed before a connection was ready.
    #[error("deadline exceeded while acquiring a connection")]
    DeadlineExceeded,

    /// Dialing the store failed.
    #[error("dial has failed: {0}")]
    Dial(#[source] redis::RedisError),
}
