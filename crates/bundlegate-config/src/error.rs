//! Error types for build configuration loading and server settings.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed.
    #[error("failed to load config file \"{}\": {message}", .path.display())]
    Load { path: PathBuf, message: String },

    /// The file parsed but holds nothing a build engine could use.
    #[error("config file \"{}\" does not export an object", .path.display())]
    Empty { path: PathBuf },

    #[error("invalid server settings: {0}")]
    InvalidSettings(String),
}

impl ConfigError {
    pub(crate) fn load(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
