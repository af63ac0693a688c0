//! Logging bootstrap
//!
//! Every crate in the workspace logs through `tracing`. Applications that do
//! not install a subscriber of their own can call [`init_logging`].

use crate::{Error, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter, e.g. `tuplespace=debug`
pub const LOG_ENV: &str = "TUPLESPACE_LOG";

/// Filter used when [`LOG_ENV`] is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install a formatting subscriber filtered by [`LOG_ENV`]
///
/// # Errors
///
/// [`Error::Config`] if the filter does not parse or a global subscriber is
/// already installed.
pub fn init_logging() -> Result<()> {
    let filter = match std::env::var(LOG_ENV) {
        Ok(directives) => EnvFilter::try_new(&directives)
            .map_err(|e| Error::Config(format!("invalid {LOG_ENV}: {e}")))?,
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|_| Error::Config("logging already initialized".into()))?;
    tracing::debug!(env = LOG_ENV, "logging initialized");
    Ok(())
}
