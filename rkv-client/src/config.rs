//! Service configuration and environment overrides.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the store address.
pub const REDIS_HOST_ENV: &str = "REDIS_HOST";
/// Environment variable overriding `max_idle`.
pub const REDIS_MAX_IDLE_ENV: &str = "REDIS_MAX_IDLE";
/// Environment variable overriding `idle_timeout`, in seconds.
pub const REDIS_IDLE_TIMEOUT_ENV: &str = "REDIS_IDLE_TIMEOUT_SECS";
/// Environment variable overriding `max_active`.
pub const REDIS_MAX_ACTIVE_ENV: &str = "REDIS_MAX_ACTIVE";
/// Environment variable overriding `connect_timeout`, in seconds.
pub const REDIS_CONNECT_TIMEOUT_ENV: &str = "REDIS_CONNECT_TIMEOUT_SECS";

/// Address used when none is configured.
pub const DEFAULT_ADDR: &str = ":6379";
/// Host substituted for an empty host part, as in `:6379`.
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_MAX_IDLE: usize = 3;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

/// Configuration for the service and its pool.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Store address, e.g. "127.0.0.1:6379" or ":6379".
    pub addr: String,
    /// Maximum idle connections kept in the pool.
    pub max_idle: usize,
    /// Idle connections older than this are closed instead of reused.
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

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            addr: DEFAULT_ADDR.to_string(),
            max_idle: DEFAULT_MAX_IDLE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_active: None,
            max_conn_lifetime: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl ServiceConfig {
    /// Default configuration pointed at `addr`.
    pub fn with_addr(addr: impl Into<String>) -> Self {
        ServiceConfig {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Default configuration with process environment overrides applied.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Applies overrides from `lookup` on top of the defaults.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = ServiceConfig::default();

        if let Some(addr) = get(REDIS_HOST_ENV) {
            config.addr = addr;
        }
        if let Some(value) = get(REDIS_MAX_IDLE_ENV) {
            config.max_idle = parse_number(REDIS_MAX_IDLE_ENV, &value)?;
        }
        if let Some(value) = get(REDIS_IDLE_TIMEOUT_ENV) {
            config.idle_timeout = Duration::from_secs(parse_number(REDIS_IDLE_TIMEOUT_ENV, &value)?);
        }
        if let Some(value) = get(REDIS_MAX_ACTIVE_ENV) {
            config.max_active = Some(parse_number(REDIS_MAX_ACTIVE_ENV, &value)?);
        }
        if let Some(value) = get(REDIS_CONNECT_TIMEOUT_ENV) {
            config.connect_timeout = Some(Duration::from_secs(parse_number(
                REDIS_CONNECT_TIMEOUT_ENV,
                &value,
            )?));
        }

        Ok(config)
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidConfig {
        name,
        value: value.to_string(),
    })
}

/// Parsed `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(addr: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress {
            addr: addr.to_string(),
        };
        let (host, port) = addr.trim().rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if port == 0 {
            return Err(invalid());
        }

        let host = host.trim_start_matches('[').trim_end_matches(']');
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        Ok(Endpoint {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
