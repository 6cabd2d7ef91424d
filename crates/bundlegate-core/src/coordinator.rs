//! The coordinator actor.
//!
//! All bundle state lives in one task. Requests, build completions, watch
//! session events and config file changes all arrive as messages and are
//! handled one at a time, so a bundle is never observed half-updated and no
//! locking is needed.
//!
//! ```text
//! Coordinator (handle) --Command--> CoordinatorActor
//!                                      |   ^
//!                      spawn build /   |   | BuildFinished / Session
//!                      watch session   v   |
//!                                    BuildEngine
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bundlegate_config::{
    ConfigLoader, FileConfigLoader, anchor_output_paths, resolve_config_path, substitute_output_path,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::dispatcher::{BundleResponse, Responder};
use crate::engine::{BuildEngine, BuildJob};
use crate::error::{BundleError, Result};
use crate::identity::{BundleIdentity, BundleRequest, ValidatedRequest};
use crate::registry::BundleRegistry;
use crate::session::{self, CompileResult, SessionEvent, WatchCycle, WatchSession};
use crate::state::{BuildPhase, BundleSnapshot};
use crate::watch::{ConfigWatchRegistry, NotifyBackend, WatchBackend};

/// Messages handled by the actor.
#[derive(Debug)]
enum Command {
    Request {
        request: BundleRequest,
        reply: Responder,
    },
    ConfigLoaded {
        identity: BundleIdentity,
        ticket: u64,
        result: Result<Arc<Value>>,
    },
    BuildFinished {
        identity: BundleIdentity,
        result: CompileResult,
    },
    Session {
        identity: BundleIdentity,
        epoch: u64,
        event: SessionEvent,
    },
    ReloadConfig {
        path: PathBuf,
        done: oneshot::Sender<usize>,
    },
    Snapshot {
        identity: BundleIdentity,
        reply: oneshot::Sender<Option<BundleSnapshot>>,
    },
    Status {
        reply: oneshot::Sender<RegistryStatus>,
    },
}

/// Process-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    pub bundles: usize,
    pub watched_config_files: usize,
}

/// Handle to a running coordinator. Cheap to clone.
///
/// The actor stops once every handle is dropped; callers still waiting at
/// that point receive [`BundleError::Shutdown`].
#[derive(Debug, Clone)]
pub struct Coordinator {
    commands: mpsc::UnboundedSender<Command>,
}

impl Coordinator {
    pub fn builder(engine: Arc<dyn BuildEngine>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            engine,
            loader: None,
            watch_backend: None,
            cwd: None,
        }
    }

    /// Queue a request. The receiver resolves once the bundle's next outcome
    /// is known, or immediately on a cache hit or a validation failure.
    pub fn submit(&self, request: BundleRequest) -> oneshot::Receiver<BundleResponse> {
        let (reply, rx) = oneshot::channel();
        // On a closed mailbox the reply sender is dropped with the command.
        let _ = self.commands.send(Command::Request { request, reply });
        rx
    }

    pub async fn request(&self, request: BundleRequest) -> BundleResponse {
        self.submit(request)
            .await
            .unwrap_or_else(|_| Err(Arc::new(BundleError::Shutdown)))
    }

    /// Invalidate the configuration of every bundle loaded from `path`,
    /// whether or not its file is watched. Returns how many bundles were
    /// affected.
    pub async fn reload_config(&self, path: impl Into<PathBuf>) -> Result<usize> {
        let (done, rx) = oneshot::channel();
        self.send(Command::ReloadConfig {
            path: path.into(),
            done,
        })?;
        rx.await.map_err(|_| BundleError::Shutdown)
    }

    pub async fn snapshot(&self, identity: &BundleIdentity) -> Result<Option<BundleSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot {
            identity: identity.clone(),
            reply,
        })?;
        rx.await.map_err(|_| BundleError::Shutdown)
    }

    pub async fn status(&self) -> Result<RegistryStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply })?;
        rx.await.map_err(|_| BundleError::Shutdown)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| BundleError::Shutdown)
    }
}

/// Configures and starts a [`Coordinator`].
#[derive(Debug)]
pub struct CoordinatorBuilder {
    engine: Arc<dyn BuildEngine>,
    loader: Option<Arc<dyn ConfigLoader>>,
    watch_backend: Option<Box<dyn WatchBackend>>,
    cwd: Option<PathBuf>,
}

impl CoordinatorBuilder {
    /// Where build configurations are read from. Defaults to the
    /// filesystem.
    pub fn loader(mut self, loader: Arc<dyn ConfigLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// How configuration files are watched. Defaults to `notify`.
    pub fn watch_backend(mut self, backend: Box<dyn WatchBackend>) -> Self {
        self.watch_backend = Some(backend);
        self
    }

    /// Directory relative configuration paths are resolved against. Defaults
    /// to the process working directory.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Spawn the actor on the current Tokio runtime.
    pub fn spawn(self) -> Coordinator {
        let (tx, rx) = mpsc::unbounded_channel();
        let cwd = self
            .cwd
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let actor = CoordinatorActor {
            engine: self.engine,
            loader: self.loader.unwrap_or_else(|| Arc::new(FileConfigLoader)),
            config_watch: ConfigWatchRegistry::new(
                self.watch_backend
                    .unwrap_or_else(|| Box::new(NotifyBackend::new())),
            ),
            registry: BundleRegistry::new(),
            cwd,
            commands: rx,
            mailbox: tx.downgrade(),
            next_epoch: 0,
            next_ticket: 0,
        };
        tokio::spawn(actor.run());

        Coordinator { commands: tx }
    }
}

struct CoordinatorActor {
    engine: Arc<dyn BuildEngine>,
    loader: Arc<dyn ConfigLoader>,
    config_watch: ConfigWatchRegistry,
    registry: BundleRegistry,
    cwd: PathBuf,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Weak so that build tasks and sessions do not keep the actor alive.
    mailbox: mpsc::WeakUnboundedSender<Command>,
    next_epoch: u64,
    next_ticket: u64,
}

impl CoordinatorActor {
    async fn run(mut self) {
        tracing::debug!("bundle coordinator started (cwd: {})", self.cwd.display());

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                path = self.config_watch.next_change() => {
                    self.on_config_changed(&path);
                }
            }
        }

        tracing::debug!("bundle coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Request { request, reply } => self.on_request(request, reply),
            Command::ConfigLoaded {
                identity,
                ticket,
                result,
            } => self.on_config_loaded(&identity, ticket, result),
            Command::BuildFinished { identity, result } => self.on_build_finished(&identity, result),
            Command::Session {
                identity,
                epoch,
                event,
            } => self.on_session_event(&identity, epoch, event),
            Command::ReloadConfig { path, done } => {
                let path = resolve_config_path(&path, &self.cwd);
                let affected = self.invalidate_path(&path, false);
                let _ = done.send(affected);
            }
            Command::Snapshot { identity, reply } => {
                let _ = reply.send(self.registry.get(&identity).map(|state| state.snapshot()));
            }
            Command::Status { reply } => {
                let _ = reply.send(RegistryStatus {
                    bundles: self.registry.len(),
                    watched_config_files: self.config_watch.len(),
                });
            }
        }
    }

    fn on_request(&mut self, request: BundleRequest, reply: Responder) {
        let ValidatedRequest {
            identity,
            bundle_root,
        } = match request.validate(&self.cwd) {
            Ok(validated) => validated,
            Err(err) => {
                tracing::debug!("rejected request: {}", err);
                let _ = reply.send(Err(Arc::new(err)));
                return;
            }
        };

        if self.registry.get(&identity).is_none() {
            tracing::debug!("new bundle {}", identity);
        }
        let state = self.registry.get_or_create(&identity);

        if identity.watch_config && !state.watching_config_file {
            match self.config_watch.ensure_watching(&identity.config_path) {
                Ok(()) => state.watching_config_file = true,
                Err(err) => tracing::warn!("{}; serving {} without config watching", err, identity),
            }
        }

        let root_changed = state
            .bundle_root
            .as_deref()
            .is_some_and(|root| root != bundle_root);
        state.bundle_root = Some(bundle_root);
        if root_changed {
            tracing::info!("bundle root changed for {}, reloading config", identity);
            if let Some(session) = state.invalidate_config() {
                session.teardown();
            }
        }

        state.enqueue(reply);
        self.advance(&identity);
    }

    /// Move a bundle with waiting callers towards an outcome: answer from a
    /// fresh result, wait for the load or build already running, or start
    /// one.
    fn advance(&mut self, identity: &BundleIdentity) {
        let Some(state) = self.registry.get_mut(identity) else {
            return;
        };
        if state.pending.is_empty() {
            return;
        }

        if let Some(body) = state.fresh_output().map(|output| output.body()) {
            let delivered = state.pending.flush(&Ok(body));
            tracing::debug!("cache hit for {} ({} callers)", identity, delivered);
            return;
        }

        match &state.phase {
            BuildPhase::Loading { .. } | BuildPhase::Building { .. } => return,
            BuildPhase::Watching(session) => match &session.cycle {
                WatchCycle::Compiling | WatchCycle::Ready(_) => return,
                WatchCycle::Failed(err) => {
                    let err = Arc::clone(err);
                    state.pending.flush(&Err(err));
                    return;
                }
            },
            BuildPhase::Idle | BuildPhase::Built(_) => {}
        }

        let Some(config) = state.config.clone() else {
            self.start_load(identity);
            return;
        };

        let job = BuildJob {
            config_path: identity.config_path.clone(),
            config,
        };
        if identity.watch_source {
            if let Err(err) = self.start_session(identity, job) {
                tracing::warn!("{}", err);
                self.fail(identity, Arc::new(err));
            }
        } else {
            self.start_build(identity, job);
        }
    }

    /// Read the bundle's configuration off the actor and resolve it against
    /// the bundle root. Other bundles keep being served meanwhile.
    fn start_load(&mut self, identity: &BundleIdentity) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            self.fail(identity, Arc::new(BundleError::Shutdown));
            return;
        };
        let Some(state) = self.registry.get_mut(identity) else {
            return;
        };
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        state.phase = BuildPhase::Loading { ticket };
        let bundle_root = state.bundle_root.clone().unwrap_or_default();

        tracing::debug!("loading config {}", identity.config_path.display());
        let loader = Arc::clone(&self.loader);
        let cwd = self.cwd.clone();
        let identity = identity.clone();
        tokio::spawn(async move {
            let result = match loader.load(&identity.config_path).await {
                Ok(raw) => {
                    let mut config = substitute_output_path(&raw, &bundle_root);
                    anchor_output_paths(&mut config, &cwd);
                    Ok(Arc::new(config))
                }
                Err(err) => Err(err.into()),
            };
            let _ = mailbox.send(Command::ConfigLoaded {
                identity,
                ticket,
                result,
            });
        });
    }

    fn on_config_loaded(
        &mut self,
        identity: &BundleIdentity,
        ticket: u64,
        result: Result<Arc<Value>>,
    ) {
        let Some(state) = self.registry.get_mut(identity) else {
            return;
        };
        if !matches!(state.phase, BuildPhase::Loading { ticket: current } if current == ticket) {
            tracing::debug!("dropping superseded config load for {}", identity);
            return;
        }
        state.phase = BuildPhase::Idle;

        match result {
            Ok(config) => {
                state.config = Some(config);
                self.advance(identity);
            }
            Err(err) => {
                tracing::warn!("{}", err);
                self.fail(identity, Arc::new(err));
            }
        }
    }

    fn start_build(&mut self, identity: &BundleIdentity, job: BuildJob) {
        let Some(mailbox) = self.mailbox.upgrade() else {
            self.fail(identity, Arc::new(BundleError::Shutdown));
            return;
        };
        let Some(state) = self.registry.get_mut(identity) else {
            return;
        };
        state.phase = BuildPhase::Building { stale: false };
        tracing::info!("building {}", identity);

        let engine = Arc::clone(&self.engine);
        let identity = identity.clone();
        tokio::spawn(async move {
            let result = session::run_once(engine.as_ref(), &identity, &job).await;
            let _ = mailbox.send(Command::BuildFinished { identity, result });
        });
    }

    fn on_build_finished(&mut self, identity: &BundleIdentity, result: CompileResult) {
        let Some(state) = self.registry.get_mut(identity) else {
            return;
        };
        let BuildPhase::Building { stale } = state.phase else {
            tracing::debug!("ignoring build result for {} (no build running)", identity);
            return;
        };

        let response: BundleResponse = match result {
            Ok(output) => {
                tracing::info!("built {}", identity);
                let body = output.body();
                state.output = Some(Arc::clone(&output));
                state.last_error = None;
                state.phase = if stale {
                    BuildPhase::Idle
                } else {
                    BuildPhase::Built(output)
                };
                Ok(body)
            }
            Err(err) => {
                tracing::warn!("{}", err);
                state.last_error = Some(Arc::clone(&err));
                state.config = None;
                state.phase = BuildPhase::Idle;
                Err(err)
            }
        };

        let delivered = state.pending.flush(&response);
        tracing::debug!("flushed {} callers for {}", delivered, identity);
    }

    fn start_session(&mut self, identity: &BundleIdentity, job: BuildJob) -> Result<()> {
        self.next_epoch += 1;
        let epoch = self.next_epoch;

        let mailbox = self.mailbox.clone();
        let reporting = identity.clone();
        let report = move |event| match mailbox.upgrade() {
            Some(tx) => tx
                .send(Command::Session {
                    identity: reporting.clone(),
                    epoch,
                    event,
                })
                .is_ok(),
            None => false,
        };

        let session = WatchSession::start(self.engine.as_ref(), identity.clone(), job, epoch, report)?;
        tracing::info!("watching sources for {}", identity);
        self.registry.get_or_create(identity).phase = BuildPhase::Watching(session);
        Ok(())
    }

    fn on_session_event(&mut self, identity: &BundleIdentity, epoch: u64, event: SessionEvent) {
        let Some(state) = self.registry.get_mut(identity) else {
            return;
        };
        let BuildPhase::Watching(session) = &mut state.phase else {
            return;
        };
        if session.epoch() != epoch {
            tracing::debug!("dropping event from a replaced session of {}", identity);
            return;
        }

        let response: BundleResponse = match event {
            SessionEvent::Invalidated => {
                tracing::debug!("sources changed, recompiling {}", identity);
                session.cycle = WatchCycle::Compiling;
                return;
            }
            SessionEvent::Compiled(Ok(output)) => {
                tracing::info!("rebuilt {}", identity);
                session.cycle = WatchCycle::Ready(Arc::clone(&output));
                let body = output.body();
                state.output = Some(output);
                state.last_error = None;
                Ok(body)
            }
            SessionEvent::Compiled(Err(err)) => {
                tracing::warn!("{}", err);
                session.cycle = WatchCycle::Failed(Arc::clone(&err));
                state.last_error = Some(Arc::clone(&err));
                Err(err)
            }
            SessionEvent::Ended => {
                tracing::warn!("watch session for {} ended", identity);
                let err = Arc::new(BundleError::build(
                    &identity.config_path,
                    "watch session ended unexpectedly",
                ));
                state.phase = BuildPhase::Idle;
                state.last_error = Some(Arc::clone(&err));
                Err(err)
            }
        };

        state.pending.flush(&response);
    }

    fn on_config_changed(&mut self, path: &Path) {
        tracing::info!("config file changed: {}", path.display());
        self.invalidate_path(path, true);
    }

    /// Invalidate every bundle loaded from `path`, restarting work for those
    /// with callers still waiting.
    fn invalidate_path(&mut self, path: &Path, only_watched: bool) -> usize {
        let identities = self.registry.identities_for(path, only_watched);

        for identity in &identities {
            let Some(state) = self.registry.get_mut(identity) else {
                continue;
            };
            if let Some(session) = state.invalidate_config() {
                tracing::debug!("tearing down watch session for {}", identity);
                session.teardown();
            }
            self.advance(identity);
        }

        identities.len()
    }

    /// Record a failure that happened before any build started and answer
    /// everyone waiting.
    fn fail(&mut self, identity: &BundleIdentity, err: Arc<BundleError>) {
        let Some(state) = self.registry.get_mut(identity) else {
            return;
        };
        state.last_error = Some(Arc::clone(&err));
        state.pending.flush(&Err(err));
    }
}
