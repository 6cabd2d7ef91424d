//! Loading build configuration files.
//!
//! A build configuration is whatever the external build engine understands, so
//! it is never deserialised into a typed struct here. JSON files are parsed as
//! is; TOML files are converted to the equivalent JSON value.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Loads a build configuration by path.
///
/// Every call must observe the file as it is on disk now. Implementations may
/// not serve a parse cached from an earlier call, since configuration edits
/// are only picked up by re-loading.
///
/// Loads run on their own task, so a slow implementation only delays the
/// bundle whose configuration it is reading.
#[async_trait]
pub trait ConfigLoader: Send + Sync + std::fmt::Debug {
    async fn load(&self, path: &Path) -> Result<Value>;
}

/// Reads build configurations from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileConfigLoader;

impl FileConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Parse configuration text according to the file's extension.
    pub fn parse(path: &Path, content: &str) -> Result<Value> {
        if content.trim().is_empty() {
            return Err(ConfigError::Empty {
                path: path.to_path_buf(),
            });
        }

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        let value = match extension {
            "json" => serde_json::from_str::<Value>(content)
                .map_err(|e| ConfigError::load(path, format!("invalid JSON: {e}")))?,
            "toml" => {
                let toml_val: toml::Value = toml::from_str(content)
                    .map_err(|e| ConfigError::load(path, format!("invalid TOML syntax: {e}")))?;
                serde_json::to_value(toml_val).map_err(|e| {
                    ConfigError::load(path, format!("TOML to JSON conversion failed: {e}"))
                })?
            }
            other => {
                return Err(ConfigError::load(
                    path,
                    format!("unsupported configuration format '{other}', expected .json or .toml"),
                ));
            }
        };

        match value {
            Value::Object(_) | Value::Array(_) => Ok(value),
            _ => Err(ConfigError::Empty {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[async_trait]
impl ConfigLoader for FileConfigLoader {
    async fn load(&self, path: &Path) -> Result<Value> {
        tracing::debug!(config = %path.display(), "reading build configuration");
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::load(path, e))?;
        Self::parse(path, &content)
    }
}

/// Resolve a client-supplied configuration path to the absolute, lexically
/// cleaned form used as part of a bundle's identity.
pub fn resolve_config_path(path: impl AsRef<Path>, cwd: &Path) -> PathBuf {
    let path = path.as_ref();
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    path_clean::clean(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_json_object() {
        let value = FileConfigLoader::parse(
            Path::new("webpack.config.json"),
            r#"{ "entry": "./index.js", "output": { "path": "[bundle_dir]/out" } }"#,
        )
        .unwrap();
        assert_eq!(value["entry"], json!("./index.js"));
    }

    #[test]
    fn parse_toml_converts_to_json() {
        let value = FileConfigLoader::parse(
            Path::new("bundle.toml"),
            r#"
entry = "./index.js"

[output]
path = "[bundle_dir]/out"
filename = "bundle-[hash].js"
"#,
        )
        .unwrap();
        assert_eq!(value["output"]["filename"], json!("bundle-[hash].js"));
    }

    #[test]
    fn parse_multi_config_array() {
        let value =
            FileConfigLoader::parse(Path::new("multi.json"), r#"[{ "entry": "a" }, { "entry": "b" }]"#)
                .unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn null_and_scalars_are_empty() {
        for content in ["null", "42", "\"config\"", "   \n"] {
            let err = FileConfigLoader::parse(Path::new("c.json"), content).unwrap_err();
            assert!(matches!(err, ConfigError::Empty { .. }), "{content}: {err}");
        }
    }

    #[test]
    fn syntax_errors_are_load_errors() {
        let err = FileConfigLoader::parse(Path::new("c.json"), "{ entry: ").unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = FileConfigLoader::parse(Path::new("webpack.config.js"), "module.exports = {}")
            .unwrap_err();
        assert!(err.to_string().contains("unsupported configuration format 'js'"));
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let resolved = resolve_config_path("./app/../webpack.config.json", Path::new("/srv/site"));
        assert_eq!(resolved, PathBuf::from("/srv/site/webpack.config.json"));

        let absolute = resolve_config_path("/etc/bundles/a.json", Path::new("/srv/site"));
        assert_eq!(absolute, PathBuf::from("/etc/bundles/a.json"));
    }
}
