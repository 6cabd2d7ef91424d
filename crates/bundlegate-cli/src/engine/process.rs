//! Running the bundler command.
//!
//! The resolved configuration is written to a temporary JSON file and the
//! command template is expanded around it:
//!
//! | Token      | Expands to                                                |
//! |------------|-----------------------------------------------------------|
//! | `{config}` | the temporary configuration file                          |
//! | `{output}` | `output.path` for one-shot builds, a staging directory in watch mode |
//!
//! Whatever the command prints on stdout is taken as its statistics.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bundlegate_config::EngineSettings;
use bundlegate_core::{BuildEngine, BuildJob, EmittedAsset, EngineError, EngineOutput, WatchHandle};
use serde_json::{Value, json};
use tempfile::{NamedTempFile, TempDir};
use walkdir::WalkDir;

pub const CONFIG_TOKEN: &str = "{config}";
pub const OUTPUT_TOKEN: &str = "{output}";

/// Build engine that shells out to a bundler.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    settings: EngineSettings,
}

impl ProcessEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}

#[async_trait]
impl BuildEngine for ProcessEngine {
    async fn build(&self, job: &BuildJob) -> Result<EngineOutput, EngineError> {
        compile(&self.settings, job, false).await
    }

    fn watch(&self, job: &BuildJob) -> Result<WatchHandle, EngineError> {
        super::watch::spawn(self.settings.clone(), job.clone())
    }
}

/// Declared output directory of a configuration. For a multi-configuration,
/// the first entry's: the command gets a single `{output}`, so staged files
/// of every entry are delivered there.
pub fn output_path(config: &Value) -> Option<PathBuf> {
    let config = match config {
        Value::Array(entries) => entries.first()?,
        other => other,
    };
    entry_output_path(config)
}

/// Every output directory a configuration declares, one per entry of a
/// multi-configuration.
pub fn output_paths(config: &Value) -> Vec<PathBuf> {
    match config {
        Value::Array(entries) => entries.iter().filter_map(entry_output_path).collect(),
        other => entry_output_path(other).into_iter().collect(),
    }
}

fn entry_output_path(config: &Value) -> Option<PathBuf> {
    config
        .get("output")?
        .get("path")?
        .as_str()
        .map(PathBuf::from)
}

/// Run the command template once.
///
/// With `stage`, `{output}` points at a fresh staging directory and every
/// file the command leaves there is returned as an in-memory asset bound for
/// the configuration's `output.path`.
pub async fn compile(
    settings: &EngineSettings,
    job: &BuildJob,
    stage: bool,
) -> Result<EngineOutput, EngineError> {
    let config_file = write_config(&job.config)?;
    let destination = output_path(&job.config);
    let staging = if stage {
        Some(TempDir::with_prefix("bundlegate-stage-").map_err(engine_error)?)
    } else {
        None
    };

    let output_dir = match (&staging, &destination) {
        (Some(dir), _) => Some(dir.path().to_path_buf()),
        (None, Some(path)) => Some(path.clone()),
        (None, None) => None,
    };

    let args = expand(&settings.command, config_file.path(), output_dir.as_deref())?;
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| EngineError::new("engine command is empty"))?;
    let working_dir = settings
        .working_dir
        .clone()
        .or_else(|| job.config_path.parent().map(Path::to_path_buf));

    tracing::debug!("running {} for {}", args.join(" "), job.config_path.display());

    let mut command = tokio::process::Command::new(program);
    command
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .map_err(|e| EngineError::new(format!("failed to run {}: {}", program, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        return Err(EngineError::new(format!(
            "{} exited with {}: {}",
            program,
            output.status,
            detail.trim()
        )));
    }

    let stats = parse_stats(&output.stdout);

    let assets = match (staging, destination) {
        (Some(staging), Some(destination)) => collect_staged(staging, destination).await?,
        (Some(_), None) => {
            tracing::debug!(
                "{} declares no output.path, discarding staged files",
                job.config_path.display()
            );
            Vec::new()
        }
        _ => Vec::new(),
    };

    Ok(EngineOutput { stats, assets })
}

fn write_config(config: &Value) -> Result<NamedTempFile, EngineError> {
    let file = tempfile::Builder::new()
        .prefix("bundlegate-config-")
        .suffix(".json")
        .tempfile()
        .map_err(engine_error)?;
    serde_json::to_writer(file.as_file(), config).map_err(engine_error)?;
    Ok(file)
}

fn expand(
    template: &[String],
    config_file: &Path,
    output_dir: Option<&Path>,
) -> Result<Vec<String>, EngineError> {
    let config = config_file.to_string_lossy();
    let output = output_dir.map(|dir| dir.to_string_lossy());

    template
        .iter()
        .map(|arg| {
            let arg = arg.replace(CONFIG_TOKEN, &config);
            match (&output, arg.contains(OUTPUT_TOKEN)) {
                (Some(output), true) => Ok(arg.replace(OUTPUT_TOKEN, output)),
                (None, true) => Err(EngineError::new(
                    "engine command uses {output} but the configuration has no output.path",
                )),
                (_, false) => Ok(arg),
            }
        })
        .collect()
}

fn parse_stats(stdout: &[u8]) -> Value {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    if text.is_empty() {
        return json!({});
    }
    serde_json::from_str(text).unwrap_or_else(|_| json!({ "stdout": text }))
}

async fn collect_staged(
    staging: TempDir,
    destination: PathBuf,
) -> Result<Vec<EmittedAsset>, EngineError> {
    tokio::task::spawn_blocking(move || {
        let mut assets = Vec::new();
        for entry in WalkDir::new(staging.path()) {
            let entry = entry.map_err(engine_error)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(staging.path())
                .map_err(engine_error)?;
            let contents = std::fs::read(entry.path()).map_err(engine_error)?;
            assets.push(EmittedAsset::in_memory(destination.join(relative), contents));
        }
        Ok::<_, EngineError>(assets)
    })
    .await
    .map_err(engine_error)?
}

fn engine_error(err: impl std::fmt::Display) -> EngineError {
    EngineError::new(err.to_string())
}
