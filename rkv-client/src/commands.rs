//! # Command Facade
//!
//! Typed `PING`, `GET` and `SET`. Each call checks the context, checks out a
//! connection, issues exactly one command and hands the connection back when
//! the guard drops, on success and failure alike.

use crate::context::Context;
use crate::error::{Error, PoolError, Result};
use crate::pool::{ConnectionPool, PooledConnection};

/// Command facade over a connection pool.
#[derive(Clone)]
pub struct Commands {
    pool: ConnectionPool,
}

impl Commands {
    pub fn new(pool: ConnectionPool) -> Self {
        Commands { pool }
    }

    /// Pings the store. Returns the reply text, `"PONG"` for Redis.
    pub fn ping(&self, ctx: &Context) -> Result<String> {
        let mut conn = self.checkout("ping", ctx)?;
        conn.query(&redis::cmd("PING"))
            .map_err(|source| Error::Command { op: "ping", source })
    }

    /// Fetches the value stored under `key`.
    ///
    /// Returns `Error::NotFound` when the key is missing.
    pub fn get(&self, ctx: &Context, key: &str) -> Result<String> {
        let mut conn = self.checkout("get", ctx)?;
        let value: Option<String> = conn
            .query(redis::cmd("GET").arg(key))
            .map_err(|source| Error::Command { op: "get", source })?;
        value.ok_or_else(|| Error::NotFound {
            key: key.to_string(),
        })
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&self, ctx: &Context, key: &str, value: &str) -> Result<()> {
        let mut conn = self.checkout("set", ctx)?;
        conn.query::<()>(redis::cmd("SET").arg(key).arg(value))
            .map_err(|source| Error::Command { op: "set", source })
    }

    fn checkout(&self, op: &'static str, ctx: &Context) -> Result<PooledConnection> {
        if let Some(reason) = ctx.err() {
            return Err(Error::Cancelled { op, reason });
        }
        self.pool.acquire(ctx).map_err(|err| match err {
            PoolError::Closed => Error::Closed { op },
            source => Error::Connection { op, source },
        })
    }
}
