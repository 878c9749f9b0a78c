//! Retry policies and the retry combinator
//!
//! Two distinct policies exist and they are not interchangeable:
//!
//! - [`RetryPolicy::linear_backoff`] is used only while opening a backend
//!   connection: the first failure sleeps one factor, the second two, and
//!   so on, bounded by `max_tries` total attempts.
//! - [`RetryPolicy::fixed_delay`] is used for record mutations: a constant
//!   delay between attempts, bounded by `max_attempts` total attempts, and
//!   applied only to the single transient fault kind the caller names via
//!   its predicate.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// A named, value-typed retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Constant delay between attempts, `max_attempts` attempts in total
    FixedDelay {
        /// Total operation attempts before the last error is surfaced
        max_attempts: u32,
        /// Delay between consecutive attempts
        delay: Duration,
    },
    /// Delay grows linearly with the attempt number (`attempt * factor`),
    /// `max_tries` attempts in total
    LinearBackoff {
        /// Total operation attempts before the last error is surfaced
        max_tries: u32,
        /// Per-attempt delay increment
        factor: Duration,
    },
}

impl RetryPolicy {
    /// Fixed-delay policy (record mutations)
    pub fn fixed_delay(max_attempts: u32, delay: Duration) -> Self {
        Self::FixedDelay { max_attempts, delay }
    }

    /// Linear-backoff policy (connection establishment)
    pub fn linear_backoff(max_tries: u32, factor: Duration) -> Self {
        Self::LinearBackoff { max_tries, factor }
    }

    /// Total attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::FixedDelay { max_attempts, .. } => *max_attempts,
            Self::LinearBackoff { max_tries, .. } => *max_tries,
        }
    }

    /// Delay before the next attempt given `failures` failed attempts so
    /// far, or `None` once the budget is spent and the error should be
    /// surfaced.
    fn delay_after_failure(&self, failures: u32) -> Option<Duration> {
        match self {
            Self::FixedDelay { max_attempts, delay } if failures < *max_attempts => Some(*delay),
            Self::LinearBackoff { max_tries, factor } if failures < *max_tries => {
                Some(*factor * failures)
            }
            _ => None,
        }
    }
}

/// Run `op` under `policy`, retrying while `retryable` approves the error
///
/// The first non-retryable error is returned immediately without sleeping.
/// When the attempt budget is spent, the last error is returned as-is.
pub async fn retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !retryable(&err) {
                    return Err(err);
                }
                failures += 1;
                match policy.delay_after_failure(failures) {
                    Some(delay) => sleep(delay).await,
                    None => return Err(err),
                }
            }
        }
    }
}
