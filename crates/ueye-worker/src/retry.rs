//! Bounded retries for transient store errors, and a log gate for loops
//! that keep failing while a dependency is down.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retry budget with doubling delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Attempts after the first one
    pub retries: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Backoff {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            base: Duration::from_millis(100),
            cap: Duration::from_secs(5),
        }
    }

    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Sleep before retry number `retry` (1-based).
    fn delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base.saturating_mul(1 << shift).min(self.cap)
    }
}

/// How a retried call ended.
#[derive(Debug, PartialEq)]
pub enum Retried<T, E> {
    Done(T),
    GaveUp { error: E, attempts: u32 },
}

/// Call `op` until it succeeds, fails with an error `is_transient` rejects,
/// or the budget runs out.
pub async fn retry_transient<T, E, F, Fut>(
    backoff: &Backoff,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Retried<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        let error = match op().await {
            Ok(value) => return Retried::Done(value),
            Err(error) => error,
        };
        if attempts > backoff.retries || !is_transient(&error) {
            return Retried::GaveUp { error, attempts };
        }
        let delay = backoff.delay(attempts);
        debug!(attempt = attempts, ?delay, error = %error, "Transient error, retrying");
        tokio::time::sleep(delay).await;
    }
}

/// Lets the first `limit` consecutive failures through to the log, then
/// stays quiet until the next success.
#[derive(Debug)]
pub struct ErrorLogGate {
    limit: u32,
    streak: u32,
}

impl ErrorLogGate {
    pub fn new(limit: u32) -> Self {
        Self { limit, streak: 0 }
    }

    /// Count a failure. Returns whether it should be logged.
    pub fn should_log(&mut self) -> bool {
        self.streak = self.streak.saturating_add(1);
        if self.streak == self.limit + 1 {
            warn!(failures = self.limit, "Repeated failures, muting until recovery");
        }
        self.streak <= self.limit
    }

    pub fn reset(&mut self) {
        if self.streak > self.limit {
            debug!(failures = self.streak, "Recovered");
        }
        self.streak = 0;
    }
}
