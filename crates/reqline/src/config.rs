//! Request log settings from the environment.
//!
//! Every field of [`Settings`] is read from a `REQLINE_`-prefixed variable:
//!
//! | Variable | Example |
//! |----------|---------|
//! | `REQLINE_ENABLED` | `false` |
//! | `REQLINE_LEVEL` | `warn` |
//! | `REQLINE_FORMATTER` | `json` |
//! | `REQLINE_IGNORE_ACTIONS` | `HealthController#show,PingController#index` |
//! | `REQLINE_FORMAT_FIELD` | `formats` |
//!
//! # Example
//!
//! ```ignore
//! use reqline::config::{config_from_env, load_dotenv};
//!
//! load_dotenv();
//! let config = config_from_env()?;
//! ```

use reqline_core::{ReqlineError, RequestLogConfig, Result, Settings};

/// Prefix of every reqline environment variable
pub const ENV_PREFIX: &str = "REQLINE_";

/// Load environment variables from a `.env` file.
///
/// Missing files are ignored and existing variables are not overridden.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Read [`Settings`] from `REQLINE_*` variables
pub fn settings_from_env() -> Result<Settings> {
    envy::prefixed(ENV_PREFIX)
        .from_env::<Settings>()
        .map_err(|e| ReqlineError::ConfigError(e.to_string()))
}

/// Build a [`RequestLogConfig`] from `REQLINE_*` variables
pub fn config_from_env() -> Result<RequestLogConfig> {
    let settings = settings_from_env()?;
    tracing::debug!(?settings, "loaded request log settings");
    RequestLogConfig::from_settings(&settings)
}
