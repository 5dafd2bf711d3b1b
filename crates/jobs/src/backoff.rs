//! Polling cadence, error backoff, and give-up limits.
//!
//! The poller queries on a fixed interval. After a transient failure the
//! delay before the next attempt grows by [`PollPolicy::multiplier`] up
//! to [`PollPolicy::max_backoff`], and resets once a query succeeds.

use std::time::Duration;

use studio_backend::config::{env_parse, env_positive, ConfigError};

/// Tunable parameters for the status poller.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay between status queries while the job is healthy.
    pub interval: Duration,
    /// Upper bound on the delay after repeated failures.
    pub max_backoff: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
    /// Give up after this many failed queries in a row. `None` never gives up.
    pub max_consecutive_errors: Option<u32>,
    /// Give up once the job has been polled this long. `None` waits forever.
    pub max_wait: Option<Duration>,
    /// Abandon a single status query after this long.
    pub request_timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            max_consecutive_errors: Some(20),
            max_wait: Some(Duration::from_secs(15 * 60)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Load the policy from environment variables with defaults.
    ///
    /// | Env Var                       | Default | Notes            |
    /// |-------------------------------|---------|------------------|
    /// | `POLL_INTERVAL_MS`            | `2000`  | must be > 0      |
    /// | `POLL_MAX_BACKOFF_SECS`       | `30`    |                  |
    /// | `POLL_MAX_CONSECUTIVE_ERRORS` | `20`    | `0` disables     |
    /// | `POLL_MAX_WAIT_SECS`          | `900`   | `0` disables     |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`    | must be > 0      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let interval_ms = env_positive("POLL_INTERVAL_MS", 2000, "a positive number of milliseconds")?;

        let max_backoff_secs: u64 = env_parse("POLL_MAX_BACKOFF_SECS", 30, "a number of seconds")?;
        let max_errors: u32 = env_parse("POLL_MAX_CONSECUTIVE_ERRORS", 20, "a whole number")?;
        let max_wait_secs: u64 = env_parse("POLL_MAX_WAIT_SECS", 900, "a number of seconds")?;
        let request_timeout_secs =
            env_positive("REQUEST_TIMEOUT_SECS", 30, "a positive whole number of seconds")?;

        let interval = Duration::from_millis(interval_ms);

        Ok(Self {
            interval,
            max_backoff: Duration::from_secs(max_backoff_secs).max(interval),
            multiplier: 2.0,
            max_consecutive_errors: (max_errors > 0).then_some(max_errors),
            max_wait: (max_wait_secs > 0).then(|| Duration::from_secs(max_wait_secs)),
            request_timeout: Duration::from_secs(request_timeout_secs),
        })
    }

    /// Same policy with a different interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self.max_backoff = self.max_backoff.max(interval);
        self
    }
}

/// Calculate the next backoff delay from the current delay and policy.
///
/// The result is clamped to [`PollPolicy::max_backoff`].
pub fn next_delay(current: Duration, policy: &PollPolicy) -> Duration {
    let next_ms = (current.as_millis() as f64 * policy.multiplier) as u64;
    Duration::from_millis(next_ms).min(policy.max_backoff)
}
