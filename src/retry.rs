use std::{future::Future, time::Duration};

use tracing::warn;

use crate::error::VhsError;

/// How many times a retryable failure is attempted again, and the base delay
/// of the linear backoff between attempts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

/// Where a retried operation stands. `attempt` counts the retries already
/// scheduled, so the first try runs with `attempt == 0`.
#[derive(Debug)]
pub enum RetryState<T> {
    Attempting { attempt: u32 },
    WaitingToRetry { attempt: u32, delay: Duration },
    Succeeded(T),
    Failed(VhsError),
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy { attempts, delay }
    }

    pub fn none() -> Self {
        RetryPolicy::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt`, starting at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay * attempt
    }

    /// Decides what follows the outcome of one try.
    pub fn next<T>(&self, attempt: u32, outcome: Result<T, VhsError>) -> RetryState<T> {
        match outcome {
            Ok(value) => RetryState::Succeeded(value),
            Err(e) if e.is_retryable() && attempt < self.attempts => {
                let attempt = attempt + 1;
                warn!(
                    "Retry attempt {} of {} after: {}",
                    attempt, self.attempts, e
                );
                RetryState::WaitingToRetry {
                    attempt,
                    delay: self.backoff(attempt),
                }
            }
            Err(e) => RetryState::Failed(e),
        }
    }

    /// Runs `op` until it succeeds, fails with a non retryable error, or the
    /// retries are exhausted. Tries never overlap. `op` receives the attempt
    /// number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, VhsError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, VhsError>>,
    {
        let mut state = RetryState::Attempting { attempt: 0 };
        loop {
            state = match state {
                RetryState::Attempting { attempt } => self.next(attempt, op(attempt).await),
                RetryState::WaitingToRetry { attempt, delay } => {
                    tokio::time::sleep(delay).await;
                    RetryState::Attempting { attempt }
                }
                RetryState::Succeeded(value) => return Ok(value),
                RetryState::Failed(e) => return Err(e),
            }
        }
    }
}
