//! Per-bundle lifecycle state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::dispatcher::{Responder, ResponseQueue};
use crate::error::BundleError;
use crate::identity::BundleIdentity;
use crate::output::BundleOutput;
use crate::session::{WatchCycle, WatchSession};

/// What the engine is doing for a bundle right now.
#[derive(Debug, Default)]
pub enum BuildPhase {
    /// Nothing running and nothing deliverable.
    #[default]
    Idle,
    /// The configuration is being read. A result carrying another ticket
    /// belongs to a load that was superseded.
    Loading { ticket: u64 },
    /// A one-shot build is in flight. `stale` is set when the configuration
    /// changed underneath it; its result still goes to the callers already
    /// waiting but is not kept.
    Building { stale: bool },
    /// A one-shot build finished and its output is still valid.
    Built(Arc<BundleOutput>),
    /// A watch session is resident.
    Watching(WatchSession),
}

/// Coarse phase name for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Idle,
    Loading,
    Building,
    Built,
    Compiling,
    Ready,
    Failed,
}

/// Everything the coordinator tracks for one bundle identity.
#[derive(Debug)]
pub struct BundleState {
    pub identity: BundleIdentity,
    /// Root the configuration was last resolved against.
    pub bundle_root: Option<String>,
    /// Loaded configuration with the output placeholder substituted.
    pub config: Option<Arc<Value>>,
    /// Last successful output, kept for reporting only.
    pub output: Option<Arc<BundleOutput>>,
    pub last_error: Option<Arc<BundleError>>,
    pub phase: BuildPhase,
    pub pending: ResponseQueue,
    /// Whether the shared config watcher is tracking this bundle's file.
    pub watching_config_file: bool,
}

impl BundleState {
    pub fn new(identity: BundleIdentity) -> Self {
        Self {
            identity,
            bundle_root: None,
            config: None,
            output: None,
            last_error: None,
            phase: BuildPhase::Idle,
            pending: ResponseQueue::new(),
            watching_config_file: false,
        }
    }

    pub fn enqueue(&mut self, responder: Responder) {
        self.pending.enqueue(responder);
    }

    /// Output that can be handed out without doing any work.
    pub fn fresh_output(&self) -> Option<&Arc<BundleOutput>> {
        match &self.phase {
            BuildPhase::Built(output) => Some(output),
            BuildPhase::Watching(session) => match &session.cycle {
                WatchCycle::Ready(output) => Some(output),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh_output().is_some()
    }

    /// Forget the loaded configuration and anything built from it.
    ///
    /// Returns the watch session, if any, so the caller can tear it down.
    pub fn invalidate_config(&mut self) -> Option<WatchSession> {
        self.config = None;
        match std::mem::take(&mut self.phase) {
            BuildPhase::Building { .. } => {
                self.phase = BuildPhase::Building { stale: true };
                None
            }
            BuildPhase::Watching(session) => Some(session),
            BuildPhase::Idle | BuildPhase::Loading { .. } | BuildPhase::Built(_) => None,
        }
    }

    pub fn phase_kind(&self) -> PhaseKind {
        match &self.phase {
            BuildPhase::Idle => PhaseKind::Idle,
            BuildPhase::Loading { .. } => PhaseKind::Loading,
            BuildPhase::Building { .. } => PhaseKind::Building,
            BuildPhase::Built(_) => PhaseKind::Built,
            BuildPhase::Watching(session) => match session.cycle {
                WatchCycle::Compiling => PhaseKind::Compiling,
                WatchCycle::Ready(_) => PhaseKind::Ready,
                WatchCycle::Failed(_) => PhaseKind::Failed,
            },
        }
    }

    pub fn snapshot(&self) -> BundleSnapshot {
        BundleSnapshot {
            identity: self.identity.clone(),
            phase: self.phase_kind(),
            fresh: self.is_fresh(),
            pending: self.pending.len(),
            watching_config_file: self.watching_config_file,
            has_config: self.config.is_some(),
            last_error: self.last_error.as_ref().map(|e| e.to_string()),
            generated_at: self.output.as_ref().map(|o| o.generated_at()),
        }
    }
}

/// Point-in-time view of a bundle, for status endpoints and tests.
#[derive(Debug, Clone, Serialize)]
pub struct BundleSnapshot {
    pub identity: BundleIdentity,
    pub phase: PhaseKind,
    pub fresh: bool,
    pub pending: usize,
    pub watching_config_file: bool,
    pub has_config: bool,
    pub last_error: Option<String>,
    pub generated_at: Option<DateTime<Utc>>,
}
