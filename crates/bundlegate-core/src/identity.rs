//! Bundle identity and incoming requests.

use std::fmt;
use std::path::{Path, PathBuf};

use bundlegate_config::resolve_config_path;
use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

/// Key of a cached bundle.
///
/// The same configuration file requested with different flags is a different
/// bundle: watch and stats modes change both lifecycle and payload, so they
/// never share state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BundleIdentity {
    pub config_path: PathBuf,
    pub watch_config: bool,
    pub watch_source: bool,
    pub full_stats: bool,
}

impl BundleIdentity {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            watch_config: false,
            watch_source: false,
            full_stats: false,
        }
    }
}

impl fmt::Display for BundleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_path.display())?;
        let flags: Vec<&str> = [
            (self.watch_config, "watch-config"),
            (self.watch_source, "watch-source"),
            (self.full_stats, "full-stats"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if !flags.is_empty() {
            write!(f, " [{}]", flags.join(", "))?;
        }
        Ok(())
    }
}

/// A bundle request as it arrives from the transport.
///
/// Required fields are optional here so a missing one can be reported with a
/// proper message instead of a deserialisation failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    #[serde(default)]
    pub path_to_config: Option<String>,

    #[serde(default)]
    pub bundle_root: Option<String>,

    #[serde(default)]
    pub watch_config_files: bool,

    #[serde(default)]
    pub watch_source_files: bool,

    #[serde(default)]
    pub output_full_stats: bool,
}

/// A request whose required fields are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub identity: BundleIdentity,
    pub bundle_root: String,
}

impl BundleRequest {
    pub fn new(path_to_config: impl Into<String>, bundle_root: impl Into<String>) -> Self {
        Self {
            path_to_config: Some(path_to_config.into()),
            bundle_root: Some(bundle_root.into()),
            ..Self::default()
        }
    }

    pub fn watch_config(mut self, on: bool) -> Self {
        self.watch_config_files = on;
        self
    }

    pub fn watch_source(mut self, on: bool) -> Self {
        self.watch_source_files = on;
        self
    }

    pub fn full_stats(mut self, on: bool) -> Self {
        self.output_full_stats = on;
        self
    }

    /// Check required fields and derive the bundle identity. Relative
    /// configuration paths are resolved against `cwd`.
    pub fn validate(&self, cwd: &Path) -> Result<ValidatedRequest> {
        let path = required(&self.path_to_config, "path_to_config")?;
        let bundle_root = required(&self.bundle_root, "bundle_root")?;

        Ok(ValidatedRequest {
            identity: BundleIdentity {
                config_path: resolve_config_path(path, cwd),
                watch_config: self.watch_config_files,
                watch_source: self.watch_source_files,
                full_stats: self.output_full_stats,
            },
            bundle_root: bundle_root.to_string(),
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BundleError::RequestValidation { field }),
    }
}
