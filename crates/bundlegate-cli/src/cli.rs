//! Command-line interface definition.
//!
//! - `bundlegate serve` - Run the build server

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bundlegate - a build server that coalesces bundle requests
#[derive(Parser, Debug)]
#[command(
    name = "bundlegate",
    version,
    about = "A build server that coalesces bundle requests",
    long_about = "bundlegate sits in front of an external module bundler and serves bundle\n\
                  requests over HTTP. Concurrent requests for the same bundle share a single\n\
                  build, finished bundles are served from memory until their configuration or\n\
                  sources change, and watch sessions keep the bundler resident between requests."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the build server
    ///
    /// Listens for bundle requests until interrupted with Ctrl+C.
    Serve(ServeArgs),
}

/// Arguments for the serve command
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on [default: 9009]
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Settings file (defaults to ./bundlegate.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Bundler command template, after `--`
    ///
    /// `{config}` expands to a JSON file holding the resolved configuration,
    /// `{output}` to the output directory.
    ///
    /// Example:
    ///   bundlegate serve -- webpack --config {config} --json
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl ServeArgs {
    pub fn overrides(&self) -> bundlegate_config::SettingsOverrides {
        bundlegate_config::SettingsOverrides {
            host: self.host.clone(),
            port: self.port,
            command: (!self.command.is_empty()).then(|| self.command.clone()),
        }
    }
}
