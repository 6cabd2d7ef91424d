//! The build engine seam.
//!
//! The engine is whatever actually compiles a configuration into artifacts.
//! The coordinator only needs two things from it: build once, or stay
//! resident and report every recompilation.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failure reported by the engine itself.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Input to one engine invocation.
#[derive(Debug, Clone)]
pub struct BuildJob {
    /// File the configuration was loaded from.
    pub config_path: PathBuf,
    /// Configuration with the output placeholder already substituted.
    pub config: Arc<Value>,
}

/// An artifact produced by a compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedAsset {
    /// Where the artifact belongs on disk.
    pub path: PathBuf,
    /// `Some` when the engine only holds the artifact in memory and the
    /// coordinator must write it out.
    pub contents: Option<Vec<u8>>,
}

impl EmittedAsset {
    pub fn in_memory(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: Some(contents.into()),
        }
    }

    pub fn on_disk(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            contents: None,
        }
    }
}

/// Raw result of a compile.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// Engine statistics, normalised by the coordinator before delivery.
    pub stats: Value,
    pub assets: Vec<EmittedAsset>,
}

/// Signals from a resident watch build.
#[derive(Debug)]
pub enum WatchEvent {
    /// A source change was detected and a recompile started.
    Invalid,
    /// A recompile finished.
    Done(EngineOutput),
    /// A recompile failed outright.
    Failed(String),
}

/// Receiving end of a watch build.
///
/// The engine keeps its watch alive for as long as the sender it got from
/// [`WatchHandle::channel`] is open; [`WatchHandle::close`] (or dropping the
/// handle) tells it to stop. When the engine drops its sender the session is
/// over.
#[derive(Debug)]
pub struct WatchHandle {
    events: mpsc::Receiver<WatchEvent>,
}

impl WatchHandle {
    pub fn channel(buffer: usize) -> (mpsc::Sender<WatchEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { events: rx })
    }

    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }

    /// Stop the engine's watch. Events already queued are discarded.
    pub fn close(mut self) {
        self.events.close();
    }
}

#[async_trait]
pub trait BuildEngine: Send + Sync + std::fmt::Debug {
    /// Compile once.
    async fn build(&self, job: &BuildJob) -> Result<EngineOutput, EngineError>;

    /// Start a resident build that recompiles on source changes. The first
    /// compile starts immediately.
    fn watch(&self, job: &BuildJob) -> Result<WatchHandle, EngineError>;
}
