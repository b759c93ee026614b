//! Bounded retry with fixed delays
//!
//! A [`RetryPolicy`] is an ordered list of delays. An action is attempted once,
//! and after every failure the error is checked against a classifier: a
//! matching (transient) error consumes the next delay and the action runs
//! again, anything else is returned immediately. When no delay is left the
//! last error is returned.

use std::future::Future;
use std::time::Duration;

/// Retry schedule made of fixed delays, one per retry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    /// Wait for each delay in turn before the corresponding retry
    pub fn from_delays(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Retry `retries` times, always waiting `delay`
    pub fn constant(delay: Duration, retries: usize) -> Self {
        Self {
            delays: vec![delay; retries],
        }
    }

    /// Attempt the action once, never retrying
    pub fn none() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Number of retries after the first attempt
    pub fn max_retries(&self) -> usize {
        self.delays.len()
    }

    /// Run `action` until it succeeds, fails permanently, or the delays run out.
    ///
    /// `on_retry` is called with the error, the delay about to be waited and
    /// the retry number (starting at 1) before every retry. It only observes.
    pub async fn execute<T, E, F, Fut, C, O>(
        &self,
        mut action: F,
        is_transient: C,
        mut on_retry: O,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        O: FnMut(&E, Duration, usize),
    {
        let mut delays = self.delays.iter();
        let mut retry = 0;

        loop {
            let error = match action().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !is_transient(&error) {
                return Err(error);
            }

            let Some(delay) = delays.next() else {
                return Err(error);
            };

            retry += 1;
            on_retry(&error, *delay, retry);
            tokio::time::sleep(*delay).await;
        }
    }
}
