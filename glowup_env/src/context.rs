//! Core environment context trait for the saver.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so that the simulation engine and
/// the lifecycle coordinator run unchanged in production (tokio) and in the
/// deterministic simulation harness.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
#[async_trait]
pub trait GlowContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Worker unit timing and the startup grace period are measured
    /// against this clock. In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a named background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Derives a seed for an independent random stream.
    ///
    /// Each simulation engine draws its pacing from its own stream so that
    /// restarting with a different worker count never perturbs another
    /// engine's timing. Production contexts ignore `stream` and return
    /// fresh entropy.
    fn derive_seed(&self, stream: u64) -> u64;

    /// Returns the context's master seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
