//! Configuration primitives for bundlegate.
//!
//! Two kinds of configuration live here:
//!
//! - **Build configurations**: the declarative files a client names with
//!   `path_to_config`. They are loaded through the [`ConfigLoader`] seam and
//!   kept opaque as a `serde_json::Value`, apart from the output placeholder
//!   rewrite in [`placeholder`].
//! - **Server settings**: how the bundlegate service itself runs, layered with
//!   figment in [`settings`].

pub mod error;
pub mod loader;
pub mod placeholder;
pub mod settings;

pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileConfigLoader, resolve_config_path};
pub use placeholder::{BUNDLE_DIR_TOKEN, anchor_output_paths, substitute_output_path};
pub use settings::{EngineSettings, ServerSettings, SettingsOverrides};
