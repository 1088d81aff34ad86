//! One-shot broadcast signal.
//!
//! Used for engine completion and for the coordinator's termination gate:
//! the signal can be raised at most once, any number of tasks can wait on
//! it, and waiting after it was raised returns immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct OneShotSignal {
    raised: AtomicBool,
    notify: Notify,
}

impl OneShotSignal {
    pub fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Raises the signal. Returns true only for the call that raised it.
    pub fn raise(&self) -> bool {
        if self.raised.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Waits until the signal is raised. Returns immediately if it already was.
    pub async fn wait(&self) {
        // Register interest before checking the flag so a raise that lands
        // between the check and the await is not missed.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_raised() {
            return;
        }
        notified.await;
    }
}
