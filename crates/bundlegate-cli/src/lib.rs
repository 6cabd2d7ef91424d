//! bundlegate - a build server that coalesces bundle requests.
//!
//! The binary wires three pieces together:
//!
//! - [`engine`] - Runs the external bundler, once or in watch mode
//! - [`server`] - HTTP transport in front of the coordinator
//! - [`commands`] - `serve` and friends
//!
//! Request coalescing, caching and configuration watching live in
//! `bundlegate-core`; this crate only adapts them to a process and a socket.

pub mod cli;
pub mod commands;
pub mod engine;
pub mod error;
pub mod logger;
pub mod server;
pub mod ui;

pub use error::{CliError, Result, ResultExt};
