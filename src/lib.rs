//! # artifact-fetcher
//!
//! Webhook-driven agent that pulls CI build artifacts onto a machine outside
//! the hosting platform's own runners. It listens for event notifications
//! over HTTP, matches them against configured artifact targets, and
//! asynchronously downloads, unpacks, and post-processes each matching run's
//! artifacts.
//!
//! ## Design
//!
//! - **Bounded queue, single worker** - fetches are serialized globally; a
//!   full queue applies backpressure to the HTTP producer instead of
//!   rejecting events
//! - **Hooks** - per-target shell commands run before and after each
//!   artifact, with the artifact's metadata in the environment
//! - **Fail loud, keep going** - hook failures and per-entry extraction
//!   failures are logged and skipped; listing and download failures abort
//!   the run
//! - **Library-first** - the binary is a thin wrapper; the queue, pipeline,
//!   and router are embeddable
//!
//! ## Quick Start
//!
//! ```no_run
//! use artifact_fetcher::Config;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(Path::new("fetcher.toml"))?;
//!     artifact_fetcher::run_with_shutdown(config).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Hook command execution
pub mod commands;
/// Configuration types and loading
pub mod config;
/// Error types
pub mod error;
/// Archive extraction
pub mod extract;
/// Fetch queue and pipeline
pub mod fetcher;
/// Artifact API client
pub mod github;
/// Inbound event endpoint
pub mod server;

// Re-export commonly used types
pub use commands::{CommandResult, CommandRunner};
pub use config::{ArtifactConfig, Config, Filter};
pub use error::{Error, Result};
pub use extract::ArchiveExtractor;
pub use fetcher::{FetchTask, Fetcher};
pub use github::{Artifact, ArtifactClient, ArtifactList};
pub use server::{AppState, Event, MatchResponse};

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Grace period for the HTTP listener to drain in-flight requests on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Run the agent until a termination signal arrives
///
/// Starts the fetch worker and the HTTP listener, then waits for SIGTERM or
/// SIGINT. On shutdown the listener gets [`SHUTDOWN_GRACE`] to drain; the
/// fetch worker finishes its current task and exits. Queued, not-yet-started
/// tasks are abandoned.
///
/// # Errors
///
/// Returns an error if the listener cannot bind the configured address.
pub async fn run_with_shutdown(config: Config) -> Result<()> {
    let config = Arc::new(config);

    let fetcher = Arc::new(Fetcher::new(ArtifactClient::new()));
    fetcher.start().await;

    let state = AppState::new(Arc::clone(&config), Arc::clone(&fetcher));
    let router = server::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, endpoint = %config.endpoint, "server listening");

    let shutdown = CancellationToken::new();
    let serve_task = tokio::spawn(server::serve(listener, router, shutdown.clone()));

    wait_for_signal().await;

    tracing::info!("shutting down");
    shutdown.cancel();
    match tokio::time::timeout(SHUTDOWN_GRACE, serve_task).await {
        Ok(Ok(Ok(()))) => tracing::info!("listener stopped"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "listener error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "listener task failed"),
        Err(_) => tracing::warn!("listener did not drain within grace period"),
    }

    fetcher.stop().await;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration can fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        _ => {
            tracing::warn!("could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C signal");
    }
}
