//! Production implementation of GlowContext using Tokio.

use crate::GlowContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;

/// Production context backed by Tokio and OS entropy.
///
/// The monotonic clock is `tokio::time::Instant`, so a runtime with paused
/// time drives it exactly like it drives `sleep`.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GlowContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("task", name = %name);
        tokio::spawn(future.instrument(span));
    }

    fn derive_seed(&self, _stream: u64) -> u64 {
        rand::random()
    }

    fn seed(&self) -> u64 {
        // Production is not seeded
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_context_follows_paused_clock() {
        let ctx = TokioContext::new();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(ctx.now() >= Duration::from_secs(5));
    }

    #[test]
    fn test_tokio_context_seed() {
        let ctx = TokioContext::new();
        assert_eq!(ctx.seed(), 0);
    }
}
