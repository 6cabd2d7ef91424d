//! Shared test utilities for bundlegate-core tests
//!
//! A scripted build engine and watch backend so coordinator behaviour can be
//! driven step by step without a real bundler.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bundlegate_config::{ConfigLoader, FileConfigLoader};
use bundlegate_core::{
    BuildEngine, BuildJob, BundleIdentity, Coordinator, EmittedAsset, EngineError, EngineOutput,
    WatchBackend, WatchError, WatchEvent, WatchHandle,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::{Semaphore, mpsc};

/// Build engine whose one-shot builds and watch sessions are controlled by
/// the test.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    builds: AtomicUsize,
    watches: AtomicUsize,
    /// When set, each one-shot build waits for a permit.
    gate: Option<Arc<Semaphore>>,
    /// Statistics returned by the next one-shot builds.
    stats: Mutex<Option<Value>>,
    /// Configurations the engine was invoked with, in order.
    configs: Mutex<Vec<Value>>,
    /// Event senders of started watch sessions, in order.
    sessions: Mutex<Vec<mpsc::Sender<WatchEvent>>>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn gated(gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            gate: Some(gate),
            ..Self::default()
        })
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn watches(&self) -> usize {
        self.watches.load(Ordering::SeqCst)
    }

    pub fn set_stats(&self, stats: Value) {
        *self.stats.lock() = Some(stats);
    }

    pub fn configs(&self) -> Vec<Value> {
        self.configs.lock().clone()
    }

    /// Sender for the `index`th watch session started.
    pub fn session(&self, index: usize) -> mpsc::Sender<WatchEvent> {
        self.sessions.lock()[index].clone()
    }

    /// Drop every session sender, as an engine that crashed would.
    pub fn end_sessions(&self) {
        self.sessions.lock().clear();
    }
}

#[async_trait]
impl BuildEngine for ScriptedEngine {
    async fn build(&self, job: &BuildJob) -> Result<EngineOutput, EngineError> {
        let build = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        self.configs.lock().push(job.config.as_ref().clone());

        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await.map_err(|e| EngineError::new(e.to_string()))?;
            permit.forget();
        }

        let stats = self
            .stats
            .lock()
            .clone()
            .unwrap_or_else(|| ok_stats(&format!("build-{build}")));
        Ok(EngineOutput {
            stats,
            assets: Vec::new(),
        })
    }

    fn watch(&self, job: &BuildJob) -> Result<WatchHandle, EngineError> {
        self.watches.fetch_add(1, Ordering::SeqCst);
        self.configs.lock().push(job.config.as_ref().clone());

        let (tx, handle) = WatchHandle::channel(16);
        self.sessions.lock().push(tx);
        Ok(handle)
    }
}

/// Watch backend that records watched paths and lets the test fire changes.
#[derive(Debug, Clone, Default)]
pub struct FakeWatch {
    changes: Arc<Mutex<Option<mpsc::UnboundedSender<PathBuf>>>>,
    watched: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeWatch {
    pub fn touch(&self, path: &Path) {
        if let Some(tx) = self.changes.lock().as_ref() {
            tx.send(path.to_path_buf()).unwrap();
        }
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        self.watched.lock().clone()
    }
}

impl WatchBackend for FakeWatch {
    fn start(&mut self, changes: mpsc::UnboundedSender<PathBuf>) -> Result<(), WatchError> {
        *self.changes.lock() = Some(changes);
        Ok(())
    }

    fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.watched.lock().push(path.to_path_buf());
        Ok(())
    }
}

/// Config loader that holds loads of one path until the test releases them.
#[derive(Debug)]
pub struct SlowLoader {
    pub slow_path: PathBuf,
    pub gate: Arc<Semaphore>,
}

#[async_trait]
impl ConfigLoader for SlowLoader {
    async fn load(&self, path: &Path) -> bundlegate_config::Result<Value> {
        if path == self.slow_path {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        FileConfigLoader.load(path).await
    }
}

/// Statistics of a clean compile, tagged with `hash` so tests can tell
/// compiles apart.
pub fn ok_stats(hash: &str) -> Value {
    json!({
        "hash": hash,
        "errors": [],
        "warnings": [],
        "assets": [{ "name": format!("main-{hash}.js") }],
        "modules": [{ "name": "./index.js", "source": "console.log(1)" }]
    })
}

pub fn done(hash: &str) -> WatchEvent {
    WatchEvent::Done(EngineOutput {
        stats: ok_stats(hash),
        assets: Vec::new(),
    })
}

pub fn done_with_assets(hash: &str, assets: Vec<EmittedAsset>) -> WatchEvent {
    WatchEvent::Done(EngineOutput {
        stats: ok_stats(hash),
        assets,
    })
}

/// Write a JSON build configuration into `dir` and return its path.
pub fn write_config(dir: &TempDir, name: &str, config: &Value) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
    path
}

pub fn default_config() -> Value {
    json!({
        "entry": "./index.js",
        "output": { "path": "[bundle_dir]/js", "filename": "[name]-[hash].js" }
    })
}

pub fn spawn(engine: &Arc<ScriptedEngine>, watch: &FakeWatch) -> Coordinator {
    Coordinator::builder(Arc::clone(engine) as Arc<dyn BuildEngine>)
        .watch_backend(Box::new(watch.clone()))
        .spawn()
}

pub fn identity(path: &Path) -> BundleIdentity {
    BundleIdentity::new(path)
}

/// Parse a success body.
pub fn body(payload: &str) -> Value {
    serde_json::from_str(payload).unwrap()
}

/// Poll `check` until it holds, failing the test after two seconds.
pub async fn eventually<F>(mut check: F)
where
    F: AsyncFnMut() -> bool,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
