use std::time::Duration;

/// Backoff floor used when [`RetryPolicy::min_delay`] is unset.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);
/// Backoff ceiling used when [`RetryPolicy::max_delay`] is unset.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Configures TLS policy, timeout and retry behavior of a [`crate::Client`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientConfig {
    /// Verify server certificates and hostnames. Disable only for test endpoints.
    pub verify_tls: bool,
    /// Call-scoped timeout covering every attempt, backoff wait and the body read.
    /// `Duration::ZERO` means no timeout.
    pub timeout: Duration,
    /// Retry policy; `None` means exactly one attempt.
    pub retry: Option<RetryPolicy>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: Duration::ZERO,
            retry: None,
        }
    }
}

impl ClientConfig {
    /// Sets the call-scoped timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables retries with the given policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Skips certificate and hostname validation.
    pub fn insecure(mut self) -> Self {
        self.verify_tls = false;
        self
    }
}

/// Number of retries and bounds of the exponential backoff between them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Retries beyond the first attempt. `2` means at most three attempts.
    pub max_attempts: u32,
    /// Backoff floor; [`DEFAULT_MIN_DELAY`] when unset.
    pub min_delay: Option<Duration>,
    /// Backoff ceiling; [`DEFAULT_MAX_DELAY`] when unset.
    pub max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, min_delay: Duration, max_delay: Duration) -> Self {
        self.min_delay = Some(min_delay);
        self.max_delay = Some(max_delay);
        self
    }

    /// Effective `(min, max)` backoff bounds. The ceiling never drops below the floor.
    pub fn delay_bounds(&self) -> (Duration, Duration) {
        let min = self.min_delay.unwrap_or(DEFAULT_MIN_DELAY);
        let max = self.max_delay.unwrap_or(DEFAULT_MAX_DELAY);
        (min, max.max(min))
    }
}
