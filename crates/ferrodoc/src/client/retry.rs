//! Retry policy for idempotent calls.
//!
//! The first attempt runs immediately; every later attempt waits the same
//! fixed delay. Only transient failures (no status code, or `UNAVAILABLE`)
//! consume further attempts; any other code ends the call at once.

use crate::logger::Logger;
use core::{future::Future, time::Duration};
use ferrodoc_core::{Error, Result};

/// Attempts left for one logical call and the delays between them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryBudget {
    attempts_remaining: usize,
    current_delay: Duration,
    next_delay: Duration,
}

impl RetryBudget {
    pub fn new(attempts: usize, retry_delay: Duration) -> Self {
        Self {
            attempts_remaining: attempts,
            current_delay: Duration::ZERO,
            next_delay: retry_delay,
        }
    }

    /// Claims one attempt, returning the delay to wait before running it, or
    /// `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<Duration> {
        if self.attempts_remaining == 0 {
            return None;
        }
        self.attempts_remaining -= 1;
        let delay = self.current_delay;
        self.current_delay = self.next_delay;
        Some(delay)
    }

    pub fn attempts_remaining(&self) -> usize {
        self.attempts_remaining
    }
}

/// Drives `attempt` until it succeeds, fails terminally, or `budget` runs
/// out. The last error is returned when the budget is exhausted.
pub(crate) async fn retry<T, F, Fut>(
    mut budget: RetryBudget,
    logger: &Logger,
    method: &str,
    request_tag: &str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    while let Some(delay) = budget.next_attempt() {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if !err.is_transient() => {
                logger.log(
                    method,
                    request_tag,
                    format_args!("Request failed with unretryable error: {err}"),
                );
                return Err(err);
            }
            Err(err) => {
                if budget.attempts_remaining() > 0 {
                    logger.log(
                        method,
                        request_tag,
                        format_args!("Retrying request that failed with error: {err}"),
                    );
                }
                last_error = Some(err);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| Error::invalid_argument("Retry budget must allow at least one attempt")))
}
