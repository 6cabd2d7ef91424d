//! Server settings with multi-source loading.
//!
//! Priority: CLI overrides > environment (`BUNDLEGATE_*`) > settings file > defaults

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Conventional settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = "bundlegate.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub engine: EngineSettings,
}

/// How the external build engine is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Command template. `{config}` expands to a file holding the resolved
    /// configuration as JSON, `{output}` to the output directory (a staging
    /// directory in watch mode).
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Debounce window for source changes in continuous mode.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Working directory for the engine process. Defaults to the directory of
    /// the configuration file being built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command: default_command(),
            debounce_ms: default_debounce_ms(),
            working_dir: None,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            engine: EngineSettings::default(),
        }
    }
}

/// Values given on the command line. `None` leaves lower layers in charge.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub command: Option<Vec<String>>,
}

impl SettingsOverrides {
    fn to_value(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        if let Some(host) = &self.host {
            root.insert("host".into(), host.clone().into());
        }
        if let Some(port) = self.port {
            root.insert("port".into(), port.into());
        }
        if let Some(command) = &self.command {
            let mut engine = serde_json::Map::new();
            engine.insert("command".into(), command.clone().into());
            root.insert("engine".into(), engine.into());
        }
        serde_json::Value::Object(root)
    }
}

impl ServerSettings {
    /// Load settings from every source.
    ///
    /// `settings_path` names an explicit settings file; without one,
    /// `bundlegate.toml` in `cwd` is used when present.
    pub fn load(
        settings_path: Option<&Path>,
        cwd: &Path,
        overrides: &SettingsOverrides,
    ) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let file = settings_path.map(Path::to_path_buf).or_else(|| {
            let default_path = cwd.join(SETTINGS_FILE);
            default_path.exists().then_some(default_path)
        });

        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::InvalidSettings(format!(
                    "settings file not found: {}",
                    path.display()
                )));
            }
            tracing::debug!(settings = %path.display(), "merging settings file");
            figment = figment.merge(Toml::file(path));
        }

        // BUNDLEGATE_PORT, BUNDLEGATE_ENGINE__DEBOUNCE_MS, ...
        figment = figment.merge(Env::prefixed("BUNDLEGATE_").split("__"));
        figment = figment.merge(Serialized::defaults(overrides.to_value()));

        let settings: Self = figment
            .extract()
            .map_err(|e| ConfigError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.command.is_empty() {
            return Err(ConfigError::InvalidSettings(
                "engine.command must name a program".to_string(),
            ));
        }
        self.addr().map(|_| ())
    }

    /// Socket address the HTTP transport binds to.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidSettings(format!("invalid host '{}': {e}", self.host)))
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    9009
}

fn default_command() -> Vec<String> {
    ["webpack", "--config", "{config}", "--json"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_debounce_ms() -> u64 {
    100
}
