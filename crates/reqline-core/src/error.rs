//! Error types for reqline

use thiserror::Error;

/// Result type alias for reqline operations
pub type Result<T, E = ReqlineError> = std::result::Result<T, E>;

/// Errors raised while building a request log configuration.
///
/// The per-request pipeline itself never fails: missing payload fields are
/// omitted from the output instead.
#[derive(Debug, Error)]
pub enum ReqlineError {
    /// The formatter name does not match any built-in formatter.
    #[error("Unknown formatter: {0}")]
    UnknownFormatter(String),

    /// The log level is not a recognised severity.
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// The format field strategy is neither `format` nor `formats`.
    #[error("Invalid format field: {0}")]
    InvalidFormatField(String),

    /// Settings could not be read from the environment.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}
