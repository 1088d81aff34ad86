//! Session action that records how often it ran instead of locking anything.

use glowup_env::{EnvError, SessionAction};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct CountingSession {
    calls: AtomicUsize,
}

impl CountingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the payload has run.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SessionAction for CountingSession {
    fn name(&self) -> &str {
        "counting"
    }

    fn end_session(&self) -> Result<(), EnvError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_calls() {
        let session = CountingSession::new();
        assert_eq!(session.calls(), 0);
        session.end_session().unwrap();
        session.end_session().unwrap();
        assert_eq!(session.calls(), 2);
    }
}
