//! # RKV Client
//!
//! Purpose: Provide a small, synchronous, connection-pooled client for a
//! Redis-compatible key-value store with four operations: ping, get, set and
//! shutdown.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `RedisService` hides pooling behind `KvService`.
//! 2. **Object Pool Pattern**: Reuse TCP connections to avoid repeated connects.
//! 3. **Delegated Protocol**: RESP framing and dialing come from the `redis` crate.
//! 4. **Recoverable Failures**: Construction and every operation return `Result`.
//!
//! ```no_run
//! use rkv_client::{Context, KvService, RedisService};
//!
//! let service = RedisService::connect(":6379")?;
//! let ctx = Context::background();
//! service.set(&ctx, "greeting", "hello")?;
//! assert_eq!(service.get(&ctx, "greeting")?, "hello");
//! service.shutdown(&ctx)?;
//! # Ok::<(), rkv_client::Error>(())
//! ```

mod commands;
mod config;
mod context;
mod error;
mod pool;
mod service;

pub use commands::Commands;
pub use config::{
    Endpoint, ServiceConfig, DEFAULT_ADDR, REDIS_CONNECT_TIMEOUT_ENV, REDIS_HOST_ENV,
    REDIS_IDLE_TIMEOUT_ENV, REDIS_MAX_ACTIVE_ENV, REDIS_MAX_IDLE_ENV,
};
pub use context::{CancelToken, Cancelled, Context};
pub use error::{Error, PoolError, PoolResult, Result};
pub use pool::{ConnectionPool, PoolConfig, PoolStats, PooledConnection};
pub use service::{KvService, RedisService};
