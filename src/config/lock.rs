use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_RETRY_INTERVAL;
use crate::constants::MAX_LEASE_DURATION;
use crate::constants::MIN_LEASE_DURATION;
use crate::constants::MIN_RETRY_INTERVAL;
use crate::Error;
use crate::Result;

/// Lease parameters applied when an entry point does not name a duration
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct LeaseConfig {
    /// Default lease duration in seconds
    /// Absent requests the store's unbounded/default lease
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

impl LeaseConfig {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(secs) = self.duration_secs {
            let duration = Duration::from_secs(secs);
            if duration < MIN_LEASE_DURATION || duration > MAX_LEASE_DURATION {
                return Err(Error::Config(ConfigError::Message(format!(
                    "lease duration_secs must be between {} and {}",
                    MIN_LEASE_DURATION.as_secs(),
                    MAX_LEASE_DURATION.as_secs()
                ))));
            }
        }

        Ok(())
    }
}

/// Cadence of the blocking-acquisition retry loop
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RetryConfig {
    /// Delay between acquisition attempts (unit: milliseconds)
    #[serde(default = "default_retry_interval_ms")]
    pub interval_ms: u64,
}

impl RetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms < MIN_RETRY_INTERVAL.as_millis() as u64 {
            return Err(Error::Config(ConfigError::Message(format!(
                "retry interval_ms must be at least {}",
                MIN_RETRY_INTERVAL.as_millis()
            ))));
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_retry_interval_ms(),
        }
    }
}

fn default_retry_interval_ms() -> u64 {
    DEFAULT_RETRY_INTERVAL.as_millis() as u64
}
