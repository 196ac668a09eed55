use std::time::Duration;

use thiserror::Error;

/// Default minimum delay between two status requests for the same job.
pub const DEFAULT_POLL_COOLDOWN: Duration = Duration::from_millis(1500);
/// Default ceiling on how long a clip may take to render before the job fails.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);
/// Default scheduler tick interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("poll cooldown must be non-zero")]
    ZeroPollCooldown,

    #[error("poll timeout must exceed the poll cooldown")]
    TimeoutTooShort,

    #[error("tick interval must be non-zero")]
    ZeroTickInterval,
}

/// Timing policy for the polling loop.
#[derive(Clone, Copy, Debug)]
pub struct QueueConfig {
    /// Minimum delay between consecutive status requests per job. Bounds the
    /// request rate against the remote service regardless of tick frequency.
    pub poll_cooldown: Duration,
    /// Maximum time from a job becoming pollable until a "finished" status
    /// must have been observed.
    pub poll_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_cooldown: DEFAULT_POLL_COOLDOWN,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_cooldown.is_zero() {
            return Err(ConfigError::ZeroPollCooldown);
        }
        if self.poll_timeout <= self.poll_cooldown {
            return Err(ConfigError::TimeoutTooShort);
        }
        Ok(())
    }
}
