//! Collaborator seams owned by the host environment.

use crate::error::EnvError;
use crate::types::ScreenSize;

/// The opaque "end of session" action (e.g. lock the screen).
///
/// The lifecycle coordinator invokes this exactly once, on the first
/// successful termination. Failures are logged by the caller and never
/// retried.
///
/// # Implementations
///
/// - **Production**: locks the session through the OS
/// - **Simulation/tests**: counting or no-op actions
pub trait SessionAction: Send + Sync + 'static {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Ends the user's session.
    fn end_session(&self) -> Result<(), EnvError>;
}

/// A session action that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSession;

impl SessionAction for NoopSession {
    fn name(&self) -> &str {
        "noop"
    }

    fn end_session(&self) -> Result<(), EnvError> {
        Ok(())
    }
}

/// Reports the drawable area the grid layout is computed over.
pub trait ScreenSource {
    /// Returns the current screen dimensions.
    fn screen_size(&self) -> Result<ScreenSize, EnvError>;

    /// Returns the screen dimensions, falling back to `fallback` on failure.
    fn screen_size_or(&self, fallback: ScreenSize) -> ScreenSize {
        match self.screen_size() {
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    %fallback,
                    "Screen size query failed, using fallback dimensions"
                );
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenScreen;

    impl ScreenSource for BrokenScreen {
        fn screen_size(&self) -> Result<ScreenSize, EnvError> {
            Err(EnvError::parse("no resolution line"))
        }
    }

    #[test]
    fn test_screen_size_fallback() {
        let size = BrokenScreen.screen_size_or(ScreenSize::new(80, 24));
        assert_eq!(size, ScreenSize::new(80, 24));
    }

    #[test]
    fn test_noop_session_succeeds() {
        assert!(NoopSession.end_session().is_ok());
        assert_eq!(NoopSession.name(), "noop");
    }
}
