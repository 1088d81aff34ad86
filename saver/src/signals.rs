//! OS signal listener.

use glowup_core::{InterruptSource, LifecycleCoordinator};
use glowup_env::GlowContext;
use std::io;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Waits for SIGINT or SIGTERM, then requests termination once.
///
/// The request runs on the blocking pool because the session action
/// shells out.
pub async fn listen<Ctx: GlowContext>(coordinator: Arc<LifecycleCoordinator<Ctx>>) {
    if let Err(e) = wait_for_signal().await {
        warn!(error = %e, "Signal listener unavailable");
        return;
    }
    info!("Received shutdown signal");

    let request = tokio::task::spawn_blocking(move || {
        coordinator.request_termination(InterruptSource::Signal)
    });
    match request.await {
        Ok(outcome) => debug!(?outcome, "Signal handled"),
        Err(e) => warn!(error = %e, "Signal handler task failed"),
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
