//! Serve command implementation.

use crate::cli::ServeArgs;
use crate::engine::ProcessEngine;
use crate::error::{CliError, Result, ResultExt};
use crate::{server, ui};
use bundlegate_config::ServerSettings;
use bundlegate_core::Coordinator;
use std::sync::Arc;

/// Execute the serve command.
///
/// Loads settings, starts the coordinator and answers requests until Ctrl+C.
pub async fn execute(args: ServeArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let settings = ServerSettings::load(args.settings.as_deref(), &cwd, &args.overrides())?;
    let addr = settings.addr()?;

    tracing::debug!("engine command: {}", settings.engine.command.join(" "));
    let engine = Arc::new(ProcessEngine::new(settings.engine.clone()));
    let coordinator = Coordinator::builder(engine).cwd(cwd.clone()).spawn();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))
        .with_hint("Pick another address with --host/--port or BUNDLEGATE_PORT")?;

    ui::success(&format!("Build server listening on http://{}", addr));
    ui::info(&format!("Engine: {}", settings.engine.command.join(" ")));
    ui::info("Press Ctrl+C to stop");

    if let Err(e) = axum::serve(listener, server::router(coordinator))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        ui::error(&format!("Build server stopped unexpectedly: {}", e));
        return Err(CliError::Server(e.to_string()));
    }

    ui::success("Build server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        ui::warning(&format!("Failed to listen for Ctrl+C: {}", e));
        std::future::pending::<()>().await;
    }
    ui::info("Shutting down build server...");
}
