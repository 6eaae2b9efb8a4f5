//! Retry policies for the operations that are allowed to retry.
//
// Only two callers retry: the shake loop re-issuing its shake command, and the
// image acquisition loop polling the camera. Serial terminator reads and
// validation/protocol errors are never retried.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Defines a policy for retrying an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// The delay between attempts.
    #[serde(with = "humantime_serde")]
    pub backoff_delay: Duration,
}

impl RetryPolicy {
    /// Policy with `max_attempts` total tries, `backoff_delay` apart.
    pub fn new(max_attempts: u32, backoff_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff_delay,
        }
    }

    /// Camera polling: 8 trigger/fetch attempts, 300 ms apart.
    pub fn image_acquisition() -> Self {
        Self::new(8, Duration::from_millis(300))
    }

    /// Re-issuing the shake command when the instrument does not acknowledge it.
    pub fn shake_reissue() -> Self {
        Self::new(3, Duration::from_secs(1))
    }

    /// True when another attempt is allowed after `attempts` have been made.
    pub fn allows_another(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
