//! Retry budgets and exponential backoff.
//!
//! A single [`RetryPolicy`] describes how often an operation is attempted and
//! how long to wait between attempts. The token refresher, the request
//! executor and the device activator all draw their budgets from
//! [`Retries`], so the schedules live in one place.
//!
//! Delays suspend the calling task with `tokio::time::sleep`; nothing is
//! queued or persisted between attempts.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use spotremote::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! let delays: Vec<_> = policy.delays().collect();
//! assert_eq!(delays, [Duration::from_secs(1), Duration::from_secs(2)]);
//! ```

use std::{future::Future, time::Duration};

/// Attempt budget with exponentially growing delays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Factor applied to the delay after every further failure.
    pub multiplier: u32,
}

impl RetryPolicy {
    /// Policy with doubling delays.
    #[must_use]
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2,
        }
    }

    /// Policy with a constant delay between attempts.
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            multiplier: 1,
        }
    }

    /// Delay to wait after the failed 0-based `attempt`.
    ///
    /// Returns `None` when `attempt` was the last one allowed.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt.saturating_add(1) >= self.max_attempts {
            return None;
        }

        let factor = self.multiplier.saturating_pow(attempt);
        Some(self.base_delay.saturating_mul(factor))
    }

    /// Whether another attempt may follow the failed 0-based `attempt`.
    #[must_use]
    pub fn has_next(&self, attempt: u32) -> bool {
        self.delay(attempt).is_some()
    }

    /// All delays of this policy, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map_while(|attempt| self.delay(attempt))
    }

    /// Suspends for the delay following `attempt`, if there is one.
    ///
    /// Returns `false` without sleeping when the budget is exhausted.
    pub async fn backoff(&self, attempt: u32) -> bool {
        match self.delay(attempt) {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                true
            }
            None => false,
        }
    }

    /// Runs `operation` until it succeeds, fails with an error for which
    /// `is_retryable` is `false`, or the attempt budget runs out.
    ///
    /// The operation receives the 0-based attempt number. The error of the
    /// last attempt is returned when every attempt failed.
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !is_retryable(&e) {
                        return Err(e);
                    }
                    if let Some(delay) = self.delay(attempt) {
                        trace!(
                            "attempt {}/{} failed, retrying in {:.1}s",
                            attempt + 1,
                            self.max_attempts,
                            delay.as_secs_f32()
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(e);
                    }
                }
            }
            attempt += 1;
        }
    }
}

/// Every retry budget used while talking to Spotify.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Retries {
    /// Refresh token exchange: 3 attempts, 1s then 2s.
    pub refresh: RetryPolicy,

    /// Playback API requests: 3 attempts, 1s then 2s.
    pub request: RetryPolicy,

    /// Pause before repeating a request with a freshly refreshed token.
    pub reauthenticate_pause: Duration,

    /// Device discovery and activation rounds: 2 rounds, 2s apart.
    pub activation: RetryPolicy,

    /// Pause before the next round when the device list could not be fetched.
    pub device_fetch_pause: Duration,

    /// Playback transfer to the fallback device: 2 attempts, 1s apart.
    pub transfer: RetryPolicy,
}

impl Retries {
    /// Budgets where every pause is scaled down to `unit`, keeping the
    /// attempt counts. Intended for tests and local tooling.
    #[must_use]
    pub const fn scaled(unit: Duration) -> Self {
        Self {
            refresh: RetryPolicy::new(3, unit),
            request: RetryPolicy::new(3, unit),
            reauthenticate_pause: unit,
            activation: RetryPolicy::fixed(2, unit),
            device_fetch_pause: unit,
            transfer: RetryPolicy::fixed(2, unit),
        }
    }
}

impl Default for Retries {
    fn default() -> Self {
        Self {
            refresh: RetryPolicy::new(3, Duration::from_secs(1)),
            request: RetryPolicy::new(3, Duration::from_secs(1)),
            reauthenticate_pause: Duration::from_millis(500),
            activation: RetryPolicy::fixed(2, Duration::from_secs(2)),
            device_fetch_pause: Duration::from_secs(1),
            transfer: RetryPolicy::fixed(2, Duration::from_secs(1)),
        }
    }
}
