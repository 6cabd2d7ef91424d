//! Command implementations.
//!
//! - [`serve`] - Run the build server

pub mod serve;

pub use serve::execute as serve_execute;
