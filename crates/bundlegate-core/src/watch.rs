//! The shared configuration file watcher.
//!
//! One watcher serves every bundle. It starts on first use and is told about
//! each configuration file at most once; changes come back as paths on a
//! channel the coordinator polls alongside its commands.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to start config watcher: {0}")]
    Start(String),

    #[error("failed to watch \"{}\": {message}", .path.display())]
    Watch { path: PathBuf, message: String },
}

/// Something that reports changes to individual files.
pub trait WatchBackend: Send + fmt::Debug {
    /// Begin watching. Changed paths are sent on `changes`.
    fn start(&mut self, changes: mpsc::UnboundedSender<PathBuf>) -> Result<(), WatchError>;

    /// Add a file to the watch set.
    fn watch(&mut self, path: &Path) -> Result<(), WatchError>;
}

/// File watching via `notify`.
///
/// Watches each file's parent directory, since editors commonly replace files
/// rather than write them in place.
#[derive(Default)]
pub struct NotifyBackend {
    watcher: Option<RecommendedWatcher>,
    directories: HashSet<PathBuf>,
}

impl fmt::Debug for NotifyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyBackend")
            .field("started", &self.watcher.is_some())
            .field("directories", &self.directories)
            .finish()
    }
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchBackend for NotifyBackend {
    fn start(&mut self, changes: mpsc::UnboundedSender<PathBuf>) -> Result<(), WatchError> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(
                event.kind,
                EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in event.paths {
                let _ = changes.send(path);
            }
        })
        .map_err(|e| WatchError::Start(e.to_string()))?;

        self.watcher = Some(watcher);
        Ok(())
    }

    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        let watcher = self
            .watcher
            .as_mut()
            .ok_or_else(|| WatchError::Start("watcher not started".to_string()))?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        if self.directories.contains(&dir) {
            return Ok(());
        }

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Watch {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        self.directories.insert(dir);
        Ok(())
    }
}

/// The coordinator's view of the config watcher.
#[derive(Debug)]
pub struct ConfigWatchRegistry {
    backend: Box<dyn WatchBackend>,
    watched: HashSet<PathBuf>,
    changes: Option<mpsc::UnboundedReceiver<PathBuf>>,
}

impl ConfigWatchRegistry {
    pub fn new(backend: Box<dyn WatchBackend>) -> Self {
        Self {
            backend,
            watched: HashSet::new(),
            changes: None,
        }
    }

    /// Make sure `path` is watched, starting the watcher if this is the
    /// first file. Idempotent per path.
    pub fn ensure_watching(&mut self, path: &Path) -> Result<(), WatchError> {
        if self.watched.contains(path) {
            return Ok(());
        }

        if self.changes.is_none() {
            let (tx, rx) = mpsc::unbounded_channel();
            self.backend.start(tx)?;
            tracing::debug!("config watcher started");
            self.changes = Some(rx);
        }

        self.backend.watch(path)?;
        self.watched.insert(path.to_path_buf());
        tracing::debug!(path = %path.display(), "watching config file");
        Ok(())
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watched.contains(path)
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    /// Next change to a watched file. Pending forever while nothing is
    /// watched or once the backend has gone away.
    pub async fn next_change(&mut self) -> PathBuf {
        let Some(changes) = self.changes.as_mut() else {
            return std::future::pending().await;
        };

        while let Some(path) = changes.recv().await {
            if self.watched.contains(&path) {
                return path;
            }
        }

        self.changes = None;
        std::future::pending().await
    }
}
