//! Bundle build coordination.
//!
//! Sits in front of an external build engine and turns many concurrent
//! requests for the same bundle into a single build:
//!
//! - [`identity`] - What makes two requests the same bundle
//! - [`state`] - Per-bundle lifecycle and the process-wide [`registry`]
//! - [`dispatcher`] - Queues of waiting callers, flushed once per outcome
//! - [`session`] - One-shot builds and long-lived watch sessions
//! - [`watch`] - The shared configuration file watcher
//! - [`coordinator`] - The entry point tying it together
//!
//! # Example
//!
//! ```rust,ignore
//! use bundlegate_core::{BundleRequest, Coordinator};
//!
//! let coordinator = Coordinator::builder(engine).spawn();
//! let payload = coordinator
//!     .request(BundleRequest::new("/srv/app/webpack.config.json", "/srv/static"))
//!     .await?;
//! ```

pub mod coordinator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod identity;
pub mod output;
pub mod persist;
pub mod registry;
pub mod session;
pub mod state;
pub mod stats;
pub mod watch;

pub use coordinator::{Coordinator, CoordinatorBuilder, RegistryStatus};
pub use dispatcher::{BundleResponse, ResponseQueue};
pub use engine::{BuildEngine, BuildJob, EmittedAsset, EngineError, EngineOutput, WatchEvent, WatchHandle};
pub use error::{BundleError, Result};
pub use identity::{BundleIdentity, BundleRequest, ValidatedRequest};
pub use output::BundleOutput;
pub use state::{BundleSnapshot, PhaseKind};
pub use watch::{NotifyBackend, WatchBackend, WatchError};
