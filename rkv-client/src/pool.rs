//! # Connection Pool
//!
//! Purpose: Reuse TCP connections to the store so each operation does not pay
//! for a fresh handshake.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Keep a bounded set of reusable idle connections.
//! 2. **Minimal Locking**: Hold the mutex only while moving idle connections;
//!    dialing, probing and commands run unlocked.
//! 3. **Validate Before Reuse**: Idle connections are evicted when stale and
//!    probed with `PING` before hand-out.
//! 4. **RAII Release**: `PooledConnection` returns itself to the pool on drop.
//!
//! ## Bounds
//! - `max_idle` caps the idle set only. Open connections are unbounded unless
//!   `max_active` is set, in which case `acquire` fails fast once it is hit.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::{Endpoint, ServiceConfig};
use crate::context::Context;
use crate::error::{PoolError, PoolResult};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Store endpoint.
    pub endpoint: Endpoint,
    /// Maximum number of idle connections to keep.
    pub max_idle: usize,
    /// Idle connections older than this are closed on the next acquire.
    pub idle_timeout: Duration,
    /// Maximum open connections (idle + in use); `None` is unbounded.
    pub max_active: Option<usize>,
    /// Connections older than this are closed instead of reused.
    pub max_conn_lifetime: Option<Duration>,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(endpoint: Endpoint, config: &ServiceConfig) -> Self {
        PoolConfig {
            endpoint,
            max_idle: config.max_idle,
            idle_timeout: config.idle_timeout,
            max_active: config.max_active,
            max_conn_lifetime: config.max_conn_lifetime,
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Open connections, idle and checked out.
    pub open: usize,
    /// Connections waiting in the idle set.
    pub idle: usize,
}

struct IdleConnection {
    conn: Connection,
    since: Instant,
}

struct PoolState {
    // Most recently returned at the front.
    idle: VecDeque<IdleConnection>,
    open: usize,
    closed: bool,
}

struct PoolInner {
    client: redis::Client,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Connection pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates an empty pool. No connection is dialed until `acquire`.
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        let client = redis::Client::open((config.endpoint.host.clone(), config.endpoint.port))
            .map_err(PoolError::Dial)?;
        let state = PoolState {
            idle: VecDeque::with_capacity(config.max_idle),
            open: 0,
            closed: false,
        };
        Ok(ConnectionPool {
            inner: Arc::new(PoolInner {
                client,
                config,
                state: Mutex::new(state),
            }),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Checks a connection out of the pool.
    ///
    /// Reuses the most recently returned idle connection when it answers the
    /// liveness probe; otherwise dials a new one.
    pub fn acquire(&self, ctx: &Context) -> PoolResult<PooledConnection> {
        if let Some(mut conn) = self.inner.take_idle()? {
            match conn.probe() {
                Ok(()) => return Ok(PooledConnection::new(self.inner.clone(), conn)),
                Err(err) => {
                    debug!(endpoint = %self.inner.config.endpoint, error = %err, "discarding idle connection that failed liveness probe");
                    drop(conn);
                    self.inner.release_slot();
                }
            }
        }

        if ctx.err().is_some() {
            return Err(PoolError::DeadlineExceeded);
        }

        self.inner.try_reserve()?;
        match self.inner.dial(ctx) {
            Ok(conn) => Ok(PooledConnection::new(self.inner.clone(), conn)),
            Err(err) => {
                self.inner.release_slot();
                Err(err)
            }
        }
    }

    /// Closes every idle connection and rejects further checkouts.
    ///
    /// Connections still checked out are closed when they are returned.
    pub fn close(&self) -> PoolResult<()> {
        let idle = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            state.closed = true;
            let idle = std::mem::take(&mut state.idle);
            state.open = state.open.saturating_sub(idle.len());
            idle
        };
        debug!(endpoint = %self.inner.config.endpoint, closed = idle.len(), "connection pool closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            open: state.open,
            idle: state.idle.len(),
        }
    }
}

impl PoolInner {
    /// Evicts stale idle connections and pops the most recent survivor.
    fn take_idle(&self) -> PoolResult<Option<Connection>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }

        let before = state.idle.len();
        state
            .idle
            .retain(|idle| !idle.is_stale(&self.config));
        let evicted = before - state.idle.len();
        if evicted > 0 {
            state.open = state.open.saturating_sub(evicted);
            debug!(endpoint = %self.config.endpoint, evicted, "evicted stale idle connections");
        }

        Ok(state.idle.pop_front().map(|idle| idle.conn))
    }

    fn try_reserve(&self) -> PoolResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }
        if let Some(max_active) = self.config.max_active {
            if state.open >= max_active {
                return Err(PoolError::Exhausted { max_active });
            }
        }
        state.open += 1;
        Ok(())
    }

    fn release_slot(&self) {
        let mut state = self.state.lock();
        state.open = state.open.saturating_sub(1);
    }

    fn dial(&self, ctx: &Context) -> PoolResult<Connection> {
        let timeout = match (self.config.connect_timeout, ctx.remaining()) {
            (Some(configured), Some(remaining)) => Some(configured.min(remaining)),
            (configured, remaining) => configured.or(remaining),
        };
        if timeout == Some(Duration::ZERO) {
            return Err(PoolError::DeadlineExceeded);
        }

        let raw = match timeout {
            Some(timeout) => self.client.get_connection_with_timeout(timeout),
            None => self.client.get_connection(),
        }
        .map_err(PoolError::Dial)?;
        raw.set_read_timeout(self.config.read_timeout)
            .map_err(PoolError::Dial)?;
        raw.set_write_timeout(self.config.write_timeout)
            .map_err(PoolError::Dial)?;

        debug!(endpoint = %self.config.endpoint, "dialed new connection");
        Ok(Connection {
            raw,
            created: Instant::now(),
        })
    }

    fn put(&self, conn: Connection, reusable: bool) {
        let mut state = self.state.lock();
        if !reusable || state.closed || conn.is_expired(&self.config) {
            state.open = state.open.saturating_sub(1);
            return;
        }

        state.idle.push_front(IdleConnection {
            conn,
            since: Instant::now(),
        });
        if state.idle.len() > self.config.max_idle {
            state.idle.pop_back();
            state.open = state.open.saturating_sub(1);
        }
    }
}

impl IdleConnection {
    fn is_stale(&self, config: &PoolConfig) -> bool {
        self.since.elapsed() >= config.idle_timeout || self.conn.is_expired(config)
    }
}

/// RAII wrapper returning a connection to the pool on drop.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(pool: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            pool,
            conn: Some(conn),
            valid: true,
        }
    }

    /// Executes one command and decodes its reply.
    ///
    /// A transport failure marks the connection broken so it is discarded
    /// instead of returned to the idle set.
    pub fn query<T: redis::FromRedisValue>(&mut self, cmd: &redis::Cmd) -> redis::RedisResult<T> {
        let conn = match self.conn.as_mut() {
            Some(conn) => conn,
            None => return Err(broken_connection()),
        };
        let reply = cmd.query(&mut conn.raw);
        if let Err(err) = &reply {
            if is_transport_error(err) {
                self.valid = false;
            }
        }
        reply
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return,
        };

        // A command interrupted by a panic may have left a reply unread.
        let reusable = self.valid && !std::thread::panicking();
        self.pool.put(conn, reusable);
    }
}

/// Single store connection.
struct Connection {
    raw: redis::Connection,
    created: Instant,
}

impl Connection {
    fn probe(&mut self) -> redis::RedisResult<()> {
        redis::cmd("PING").query::<String>(&mut self.raw).map(|_| ())
    }

    fn is_expired(&self, config: &PoolConfig) -> bool {
        config
            .max_conn_lifetime
            .is_some_and(|lifetime| self.created.elapsed() >= lifetime)
    }
}

fn is_transport_error(err: &redis::RedisError) -> bool {
    err.is_io_error() || err.is_connection_dropped() || err.is_timeout()
}

fn broken_connection() -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::IoError, "connection already released"))
}
