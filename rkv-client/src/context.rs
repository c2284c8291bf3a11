//! # Request Context
//!
//! Carries the caller's deadline and cancellation signal into an operation.
//! Operations check it once, before acquiring a connection. A command that is
//! already on the wire is not interrupted.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancelled {
    /// The deadline has passed.
    DeadlineExceeded,
    /// The cancellation token was triggered.
    Cancelled,
}

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cancelled::DeadlineExceeded => write!(f, "context deadline exceeded"),
            Cancelled::Cancelled => write!(f, "context canceled"),
        }
    }
}

impl std::error::Error for Cancelled {}

/// Shared flag used to cancel one or more contexts from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every context holding this token as cancelled.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Deadline and cancellation signal for a single operation.
///
/// `Context::background()` never expires.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    token: Option<CancelToken>,
}

impl Context {
    /// A context with no deadline and no cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Context {
            deadline: Some(deadline),
            token: None,
        }
    }

    /// Attaches a cancellation token.
    pub fn cancelled_by(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<Cancelled> {
        if self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(Cancelled::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancelled::DeadlineExceeded),
            _ => None,
        }
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
