//! # Service Facade
//!
//! `KvService` is the capability set callers program against. `RedisService`
//! is the one implementation: a connection pool plus the command facade,
//! created once at startup and shut down once.

use tracing::{debug, info, warn};

use crate::commands::Commands;
use crate::config::{Endpoint, ServiceConfig};
use crate::context::Context;
use crate::error::{Error, PoolError, Result};
use crate::pool::{ConnectionPool, PoolConfig, PoolStats};

/// Client interface for the key-value store.
pub trait KvService: Send + Sync {
    /// Runs a liveness round trip and returns the store's reply.
    fn ping(&self, ctx: &Context) -> Result<String>;

    /// Returns the value stored under `key`.
    fn get(&self, ctx: &Context, key: &str) -> Result<String>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&self, ctx: &Context, key: &str, value: &str) -> Result<()>;

    /// Closes the connection pool. Later calls fail with `Error::Closed`.
    fn shutdown(&self, ctx: &Context) -> Result<()>;
}

/// Pooled Redis implementation of [`KvService`].
pub struct RedisService {
    pool: ConnectionPool,
    commands: Commands,
}

impl RedisService {
    /// Connects with default settings to `addr`.
    pub fn connect(addr: impl Into<String>) -> Result<Self> {
        Self::with_config(ServiceConfig::with_addr(addr))
    }

    /// Connects using `REDIS_*` environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::with_config(ServiceConfig::from_env()?)
    }

    /// Connects with a custom configuration.
    pub fn with_config(config: ServiceConfig) -> Result<Self> {
        Self::with_context(&Context::background(), config)
    }

    /// Builds the pool and health-checks one connection before returning.
    ///
    /// The checked connection is left idle in the pool. Fails when the store
    /// is unreachable; no handle is returned in that case.
    pub fn with_context(ctx: &Context, config: ServiceConfig) -> Result<Self> {
        let endpoint: Endpoint = config.addr.parse()?;
        let pool = ConnectionPool::new(PoolConfig::new(endpoint, &config)).map_err(|source| {
            Error::Connection {
                op: "initialization",
                source,
            }
        })?;
        let commands = Commands::new(pool.clone());

        if let Err(err) = commands.ping(ctx) {
            warn!(addr = %config.addr, error = %err, "service health check has failed");
            if let Err(close_err) = pool.close() {
                debug!(error = %close_err, "closing pool after failed health check");
            }
            return Err(err);
        }

        info!(endpoint = %pool.config().endpoint, "service successfully initialized, ready for use");
        Ok(RedisService { pool, commands })
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl KvService for RedisService {
    fn ping(&self, ctx: &Context) -> Result<String> {
        self.commands.ping(ctx)
    }

    fn get(&self, ctx: &Context, key: &str) -> Result<String> {
        self.commands.get(ctx, key)
    }

    fn set(&self, ctx: &Context, key: &str, value: &str) -> Result<()> {
        self.commands.set(ctx, key, value)
    }

    fn shutdown(&self, ctx: &Context) -> Result<()> {
        if let Some(reason) = ctx.err() {
            return Err(Error::Cancelled {
                op: "shutdown",
                reason,
            });
        }

        self.pool.close().map_err(|err| match err {
            PoolError::Closed => Error::Closed { op: "shutdown" },
            source => Error::Connection {
                op: "shutdown",
                source,
            },
        })?;

        info!(endpoint = %self.pool.config().endpoint, "service shutdown is complete");
        Ok(())
    }
}
