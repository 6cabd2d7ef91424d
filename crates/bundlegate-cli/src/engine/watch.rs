//! Continuous builds for the process engine.
//!
//! The bundler command itself runs one-shot; residency comes from watching the
//! configuration's source tree and re-running the command after changes
//! settle. Output lands in a staging directory and is handed back as
//! in-memory assets, so the coordinator decides when it reaches the real
//! output directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bundlegate_config::EngineSettings;
use bundlegate_core::{BuildJob, EngineError, WatchEvent, WatchHandle};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use serde_json::Value;
use tokio::sync::mpsc;

use super::process::{compile, output_paths};

const EVENT_BUFFER: usize = 16;

/// Start watching `job`'s sources. The first compile starts immediately.
pub fn spawn(settings: EngineSettings, job: BuildJob) -> Result<WatchHandle, EngineError> {
    let root = source_root(&job);
    let outputs = output_paths(&job.config);
    let (changes_tx, mut changes) = mpsc::unbounded_channel::<()>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else {
            return;
        };
        if !matches!(
            event.kind,
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
        ) {
            return;
        }
        // Writing our own output must not trigger another compile.
        if event.paths.iter().all(|path| is_output(path, &outputs)) {
            return;
        }
        let _ = changes_tx.send(());
    })
    .map_err(|e| EngineError::new(format!("failed to start source watcher: {}", e)))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| EngineError::new(format!("failed to watch {}: {}", root.display(), e)))?;

    let (events, handle) = WatchHandle::channel(EVENT_BUFFER);
    let debounce = Duration::from_millis(settings.debounce_ms);
    tracing::debug!("watching sources under {}", root.display());

    tokio::spawn(async move {
        // Dropping the watcher ends the file system subscription.
        let _watcher = watcher;

        if !report(&events, &settings, &job).await {
            return;
        }

        loop {
            tokio::select! {
                _ = events.closed() => break,
                change = changes.recv() => {
                    if change.is_none() {
                        break;
                    }
                }
            }

            // Let a burst of writes settle into one recompile.
            loop {
                match tokio::time::timeout(debounce, changes.recv()).await {
                    Ok(Some(())) => continue,
                    Ok(None) => return,
                    Err(_) => break,
                }
            }

            if events.send(WatchEvent::Invalid).await.is_err() {
                break;
            }
            if !report(&events, &settings, &job).await {
                break;
            }
        }

        tracing::debug!("stopped watching sources of {}", job.config_path.display());
    });

    Ok(handle)
}

async fn report(events: &mpsc::Sender<WatchEvent>, settings: &EngineSettings, job: &BuildJob) -> bool {
    let event = match compile(settings, job, true).await {
        Ok(output) => WatchEvent::Done(output),
        Err(err) => WatchEvent::Failed(err.message),
    };
    events.send(event).await.is_ok()
}

/// Whether `path` is build output: inside an output directory, or one of the
/// directories created on the way to it.
fn is_output(path: &Path, outputs: &[PathBuf]) -> bool {
    outputs
        .iter()
        .any(|output| path.starts_with(output) || output.starts_with(path))
}

/// Directory whose changes trigger a recompile: the configuration's
/// `context` when it declares one, else the configuration file's directory.
pub fn source_root(job: &BuildJob) -> PathBuf {
    let config_dir = job
        .config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let config = match job.config.as_ref() {
        Value::Array(entries) => entries.first(),
        other => Some(other),
    };
    match config.and_then(|c| c.get("context")).and_then(Value::as_str) {
        Some(context) => config_dir.join(context),
        None => config_dir,
    }
}
