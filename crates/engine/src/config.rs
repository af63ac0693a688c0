//! Space configuration
//!
//! Settings can be built in code through [`SpaceBuilder`](crate::SpaceBuilder)
//! or loaded from TOML:
//!
//! ```toml
//! # Length of one lease minute, in milliseconds
//! minute_ms = 60000
//! # Period of the compaction job, in seconds
//! cleanup_period_secs = 900
//! # Drop undelivered registrations after this many seconds (optional)
//! registration_lease_secs = 3600
//! ```
//!
//! Every key is optional; missing keys take the defaults below.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tuplespace_core::{Error, Result};

/// Default length of a lease minute
pub const DEFAULT_MINUTE: Duration = Duration::from_secs(60);

/// Default period of the compaction job
pub const DEFAULT_CLEANUP_PERIOD: Duration = Duration::from_secs(15 * 60);

/// Shortest lease a write can ask for, in minutes
pub const MIN_TTL_MINUTES: u64 = 1;

/// Runtime settings of a [`Space`](crate::Space)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceConfig {
    /// Wall-clock length of one lease minute
    pub minute: Duration,
    /// How often empty index nodes are pruned
    pub cleanup_period: Duration,
    /// Age after which an undelivered registration is dropped
    pub registration_lease: Option<Duration>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            minute: DEFAULT_MINUTE,
            cleanup_period: DEFAULT_CLEANUP_PERIOD,
            registration_lease: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    minute_ms: u64,
    cleanup_period_secs: u64,
    registration_lease_secs: Option<u64>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            minute_ms: DEFAULT_MINUTE.as_millis() as u64,
            cleanup_period_secs: DEFAULT_CLEANUP_PERIOD.as_secs(),
            registration_lease_secs: None,
        }
    }
}

impl From<RawConfig> for SpaceConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            minute: Duration::from_millis(raw.minute_ms),
            cleanup_period: Duration::from_secs(raw.cleanup_period_secs),
            registration_lease: raw.registration_lease_secs.map(Duration::from_secs),
        }
    }
}

impl SpaceConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// [`Error::Config`] on malformed TOML, unknown keys or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        let config = Self::from(raw);
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Check that every period is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.minute.is_zero() {
            return Err(Error::Config("minute must be non-zero".into()));
        }
        if self.cleanup_period.is_zero() {
            return Err(Error::Config("cleanup period must be non-zero".into()));
        }
        if self.registration_lease.map_or(false, |lease| lease.is_zero()) {
            return Err(Error::Config("registration lease must be non-zero".into()));
        }
        Ok(())
    }

    /// Lease for a write asking for `ttl_minutes`, raised to the minimum
    pub fn lease_for(&self, ttl_minutes: u64) -> Duration {
        let minutes = ttl_minutes.max(MIN_TTL_MINUTES);
        self.minute.saturating_mul(u32::try_from(minutes).unwrap_or(u32::MAX))
    }
}
