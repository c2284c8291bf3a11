//! rkv - run one command against a Redis-compatible store through the pooled client.
//!
//! Usage:
//!   rkv ping
//!   rkv set greeting hello
//!   rkv --addr cache:6379 get greeting
//!   REDIS_HOST=cache:6379 rkv --debug ping

use std::time::Duration;

use anyhow::{anyhow, Context as _, Result};
use clap::{Parser, Subcommand};
use rkv_client::{Context, KvService, RedisService, ServiceConfig, DEFAULT_ADDR};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rkv", author, version, about = "Pooled client for a Redis-compatible key-value store")]
struct Cli {
    /// Store address as host:port (an empty host means localhost)
    #[arg(long, env = "REDIS_HOST", default_value = DEFAULT_ADDR, global = true)]
    addr: String,

    /// Per-command deadline in seconds, also used as the connect timeout
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Enable debug logging (unless RUST_LOG is set)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check connectivity; prints the store's reply
    Ping,
    /// Print the value stored under a key
    Get { key: String },
    /// Store a value under a key
    Set { key: String, value: String },
}

fn init_tracing(debug: bool) -> Result<()> {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

fn context_for(timeout: Option<Duration>) -> Context {
    match timeout {
        Some(timeout) => Context::with_timeout(timeout),
        None => Context::background(),
    }
}

/// Layers command-line flags over the environment-derived config.
///
/// `--timeout` only replaces socket timeouts when it is given.
fn build_config(addr: String, timeout: Option<Duration>, env: ServiceConfig) -> ServiceConfig {
    let mut config = env;
    config.addr = addr;
    if let Some(timeout) = timeout {
        config.connect_timeout = Some(timeout);
        config.read_timeout = Some(timeout);
        config.write_timeout = Some(timeout);
    }
    config
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let timeout = cli.timeout.map(Duration::from_secs);
    let config = build_config(cli.addr, timeout, ServiceConfig::from_env()?);
    debug!(?config, "starting");

    let service = RedisService::with_context(&context_for(timeout), config)
        .context("redis: new service initialization has failed")?;

    let outcome = run(&service, cli.command, timeout);
    let shutdown = service.shutdown(&Context::background());

    outcome?;
    shutdown.context("redis: service shutdown has failed")
}

fn run(service: &dyn KvService, command: Command, timeout: Option<Duration>) -> Result<()> {
    let ctx = context_for(timeout);
    match command {
        Command::Ping => {
            let reply = service.ping(&ctx)?;
            println!("{reply}");
        }
        Command::Get { key } => match service.get(&ctx, &key) {
            Ok(value) => println!("{value}"),
            Err(err) if err.is_not_found() => {
                return Err(anyhow!("key {key:?} not found"));
            }
            Err(err) => return Err(err.into()),
        },
        Command::Set { key, value } => {
            service.set(&ctx, &key, &value)?;
            println!("OK");
        }
    }
    Ok(())
}
