//! Build sessions: one engine invocation per bundle at a time.
//!
//! A one-shot build runs the engine once and reports once. A watch session
//! keeps the engine resident and reports every recompilation, writing the
//! engine's in-memory artifacts to disk before a compile counts as done.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::engine::{BuildEngine, BuildJob, EngineOutput, WatchEvent};
use crate::error::{BundleError, Result};
use crate::identity::BundleIdentity;
use crate::output::BundleOutput;
use crate::persist::persist_assets;
use crate::stats::{compile_errors, normalize_stats};

/// Outcome of one compile as delivered to callers.
pub type CompileResult = std::result::Result<Arc<BundleOutput>, Arc<BundleError>>;

/// Signals a watch session reports back to its owner.
#[derive(Debug)]
pub enum SessionEvent {
    /// The engine started recompiling; the previous result is stale.
    Invalidated,
    /// A compile finished, including artifact persistence.
    Compiled(CompileResult),
    /// The engine stopped watching on its own.
    Ended,
}

/// Where a watch session is in its compile cycle.
#[derive(Debug, Clone)]
pub enum WatchCycle {
    Compiling,
    Ready(Arc<BundleOutput>),
    Failed(Arc<BundleError>),
}

/// Run the engine once and turn its output into a deliverable result.
pub async fn run_once(engine: &dyn BuildEngine, identity: &BundleIdentity, job: &BuildJob) -> CompileResult {
    let output = engine
        .build(job)
        .await
        .map_err(|e| Arc::new(BundleError::build(&identity.config_path, e)))?;
    complete(identity, job, output, false).await.map_err(Arc::new)
}

/// Normalise statistics, reject compiles with errors, optionally persist
/// in-memory artifacts, and serialise the payload.
async fn complete(
    identity: &BundleIdentity,
    job: &BuildJob,
    output: EngineOutput,
    persist: bool,
) -> Result<Arc<BundleOutput>> {
    let stats = normalize_stats(output.stats, identity.full_stats);

    let errors = compile_errors(&stats);
    if !errors.is_empty() {
        return Err(BundleError::build(&identity.config_path, errors.join("\n\n")));
    }

    if persist {
        persist_assets(&output.assets).await?;
    }

    BundleOutput::new(identity, &job.config, &stats).map(Arc::new)
}

/// A running watch session owned by one bundle.
#[derive(Debug)]
pub struct WatchSession {
    epoch: u64,
    pub cycle: WatchCycle,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatchSession {
    /// Start the engine's watch build and a task relaying its events through
    /// `report`. `report` returns `false` once nobody is listening anymore.
    ///
    /// `epoch` tags this session so that events from a torn-down session can
    /// be told apart from its successor's.
    pub fn start<F>(
        engine: &dyn BuildEngine,
        identity: BundleIdentity,
        job: BuildJob,
        epoch: u64,
        report: F,
    ) -> Result<Self>
    where
        F: Fn(SessionEvent) -> bool + Send + 'static,
    {
        let mut handle = engine
            .watch(&job)
            .map_err(|e| BundleError::build(&identity.config_path, e))?;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = &mut stop_rx => {
                        handle.close();
                        return;
                    }
                    event = handle.next() => event,
                };

                let relayed = match event {
                    Some(WatchEvent::Invalid) => SessionEvent::Invalidated,
                    Some(WatchEvent::Done(output)) => SessionEvent::Compiled(
                        complete(&identity, &job, output, true).await.map_err(Arc::new),
                    ),
                    Some(WatchEvent::Failed(message)) => SessionEvent::Compiled(Err(Arc::new(
                        BundleError::build(&identity.config_path, message),
                    ))),
                    None => {
                        report(SessionEvent::Ended);
                        return;
                    }
                };

                if !report(relayed) {
                    handle.close();
                    return;
                }
            }
        });

        Ok(Self {
            epoch,
            cycle: WatchCycle::Compiling,
            stop: Some(stop_tx),
            task,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Close the engine's watch, then drop the session.
    pub fn teardown(mut self) {
        if let Some(stop) = self.stop.take() {
            if stop.send(()).is_err() {
                // relay already exited; its handle is gone with it
                self.task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, WatchHandle};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    #[derive(Debug, Default)]
    struct StubEngine {
        stats: Value,
        senders: Mutex<Vec<mpsc::Sender<WatchEvent>>>,
    }

    #[async_trait]
    impl BuildEngine for StubEngine {
        async fn build(&self, _job: &BuildJob) -> std::result::Result<EngineOutput, EngineError> {
            Ok(EngineOutput {
                stats: self.stats.clone(),
                assets: Vec::new(),
            })
        }

        fn watch(&self, _job: &BuildJob) -> std::result::Result<WatchHandle, EngineError> {
            let (tx, handle) = WatchHandle::channel(8);
            self.senders.lock().unwrap().push(tx);
            Ok(handle)
        }
    }

    fn job() -> BuildJob {
        BuildJob {
            config_path: "/app/webpack.config.json".into(),
            config: Arc::new(json!({ "entry": "./index.js" })),
        }
    }

    #[tokio::test]
    async fn run_once_rejects_stats_with_errors() {
        let engine = StubEngine {
            stats: json!({ "errors": ["Module not found: ./missing"] }),
            ..Default::default()
        };
        let identity = BundleIdentity::new("/app/webpack.config.json");

        let err = run_once(&engine, &identity, &job()).await.unwrap_err();
        assert!(matches!(*err, BundleError::Build { .. }));
        assert!(err.to_string().contains("Module not found"));
    }

    #[tokio::test]
    async fn run_once_serialises_normalised_stats() {
        let engine = StubEngine {
            stats: json!({ "errors": [], "modules": [{ "name": "./index.js" }] }),
            ..Default::default()
        };
        let identity = BundleIdentity::new("/app/webpack.config.json");

        let output = run_once(&engine, &identity, &job()).await.unwrap();
        let body: Value = serde_json::from_str(&output.body()).unwrap();
        assert!(body["stats"].get("modules").is_none());
    }

    #[tokio::test]
    async fn teardown_closes_the_engine_watch() {
        let engine = StubEngine::default();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let session = WatchSession::start(
            &engine,
            BundleIdentity::new("/app/webpack.config.json"),
            job(),
            1,
            move |event| events_tx.send(event).is_ok(),
        )
        .unwrap();

        let sender = engine.senders.lock().unwrap()[0].clone();
        sender.send(WatchEvent::Invalid).await.unwrap();
        assert!(matches!(events_rx.recv().await, Some(SessionEvent::Invalidated)));

        session.teardown();
        sender.closed().await;
        assert!(sender.is_closed());
    }

    #[tokio::test]
    async fn engine_hanging_up_ends_the_session() {
        let engine = StubEngine::default();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let _session = WatchSession::start(
            &engine,
            BundleIdentity::new("/app/webpack.config.json"),
            job(),
            1,
            move |event| events_tx.send(event).is_ok(),
        )
        .unwrap();

        engine.senders.lock().unwrap().clear();
        assert!(matches!(events_rx.recv().await, Some(SessionEvent::Ended)));
    }
}
