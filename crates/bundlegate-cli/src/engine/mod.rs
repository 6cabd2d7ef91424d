//! Build engine backed by an external bundler process.
//!
//! - [`process`] - Running the command template once
//! - [`watch`] - Recompiling on source changes

pub mod process;
pub mod watch;

pub use process::ProcessEngine;
