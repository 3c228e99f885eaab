//! Configuration for retrying report submissions with capped exponential backoff.

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid retry configuration: {0}")]
    InvalidParameter(&'static str),
}

/// Parameters controlling how many times a report submission is attempted, and how long to wait
/// between attempts.
///
/// The delay before the `n`th retry is `base_delay_ms * 2^(n-1)`, capped at `max_delay_ms`. With
/// `jitter` enabled, a random amount of up to one additional delay is added to each wait, and the
/// result is capped at `max_delay_ms` again. The defaults follow the parameters used in the GCP Go
/// SDK[1].
///
/// [1]: https://github.com/googleapis/gax-go/blob/fbaf9882acf3297573f3a7cb832e54c7d8f40635/v2/call_option.go#L120
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound on the delay between attempts, in milliseconds.
    pub max_delay_ms: u64,
    /// Whether to randomize delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Checks that the parameters describe a usable retry policy.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_attempts < 1 {
            return Err(Error::InvalidParameter("max_attempts must be at least 1"));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::InvalidParameter(
                "base_delay_ms must not exceed max_delay_ms",
            ));
        }
        Ok(())
    }

    /// Returns the delays to wait before each retry: at most `max_attempts - 1` of them, none
    /// longer than `max_delay_ms`.
    pub fn backoff(&self) -> Backoff {
        let max_delay = Duration::from_millis(self.max_delay_ms);
        let builder = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(max_delay)
            .with_factor(2.0)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize);
        let builder = if self.jitter {
            builder.with_jitter()
        } else {
            builder
        };
        Backoff {
            delays: builder.build(),
            max_delay,
        }
    }
}

/// The retry delays described by a [`RetryConfig`].
///
/// [`backon`] applies jitter after its own delay cap, so the cap is enforced again here.
#[derive(Debug)]
pub struct Backoff {
    delays: ExponentialBackoff,
    max_delay: Duration,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.delays.next().map(|delay| delay.min(self.max_delay))
    }
}

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util {
    use crate::retries::RetryConfig;

    /// A [`RetryConfig`] with short, deterministic delays, suitable for tests.
    pub fn test_retry_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter: false,
        }
    }
}
