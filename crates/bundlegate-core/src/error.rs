//! Failure causes surfaced to callers.
//!
//! None of these are distinguished by the transport; each caller only sees the
//! message. They are kept apart here so logs and tests can tell them apart.

use std::path::PathBuf;

use bundlegate_config::ConfigError;
use thiserror::Error;

pub type Result<T, E = BundleError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum BundleError {
    /// A required request field was absent. Reported only to the offending
    /// caller, never queued.
    #[error("No {field} option was provided")]
    RequestValidation { field: &'static str },

    #[error("failed to load config file \"{}\": {message}", .path.display())]
    ConfigLoad { path: PathBuf, message: String },

    #[error("config file \"{}\" does not export an object", .path.display())]
    ConfigEmpty { path: PathBuf },

    #[error("build of \"{}\" failed: {message}", .path.display())]
    Build { path: PathBuf, message: String },

    /// The engine compiled successfully but an artifact could not be written.
    #[error("failed to write asset \"{}\": {message}", .asset.display())]
    AssetPersist { asset: PathBuf, message: String },

    #[error("bundle coordinator is not running")]
    Shutdown,
}

impl BundleError {
    pub(crate) fn build(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Build {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

impl From<ConfigError> for BundleError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Load { path, message } => Self::ConfigLoad { path, message },
            ConfigError::Empty { path } => Self::ConfigEmpty { path },
            ConfigError::InvalidSettings(message) => Self::ConfigLoad {
                path: PathBuf::new(),
                message,
            },
        }
    }
}
