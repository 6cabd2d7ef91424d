//! Error handling for the bundlegate CLI.
//!
//! Failures that reach the command line are all startup problems: bad
//! settings, an address that cannot be bound, a server that dies. Bundle
//! failures never surface here; they are answered to the requesting client.
//!
//! # Example
//!
//! ```rust,no_run
//! use bundlegate_cli::error::{Result, ResultExt};
//!
//! fn read_settings() -> Result<String> {
//!     std::fs::read_to_string("bundlegate.toml").with_hint("Create a bundlegate.toml or pass --settings")
//! }
//! ```

mod miette;

pub use self::miette::cli_error_to_miette;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] bundlegate_config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Attach context to fallible operations.
pub trait ResultExt<T> {
    /// Append a hint telling the user how to fix the problem.
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T>;

    /// Prefix the error with what was being attempted.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_hint(self, hint: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}\n\nHint: {}", err, hint))
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}
