//! Configuration for lock engines handed out by the factory.
//!
//! Provides configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Optional TOML config file
//! 3. Environment variables (highest priority, `DLOCK` prefix)

mod lock;
pub use lock::*;


//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LockConfig {
    /// Lease parameters applied when an entry point does not name a
    /// duration
    #[serde(default)]
    pub lease: LeaseConfig,
    /// Retry policy for blocking acquisition
    #[serde(default)]
    pub retry: RetryConfig,
}

impl LockConfig {
    /// Load configuration, layering an optional file under environment
    /// variable overrides.
    ///
    /// # Arguments
    /// * `path` - Optional path to a TOML configuration file
    ///
    /// # Returns
    /// Merged and validated configuration
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Environment variables (highest priority)
        builder = builder.add_source(
            Environment::with_prefix("DLOCK")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: LockConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validates all lock subsystem configurations
    pub fn validate(&self) -> Result<()> {
        self.lease.validate()?;
        self.retry.validate()?;

        Ok(())
    }
}
