use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Coalescing notification: holds at most one pending token.
///
/// Signals raised while a token is already pending are dropped rather than
/// queued, so a burst of changes wakes the consumer once.
#[derive(Debug, Default)]
pub struct ChangeSignal {
    pending: AtomicBool,
    waker: Notify,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `false` if a token was already pending and
    /// this one was dropped.
    pub fn notify(&self) -> bool {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.waker.notify_one();
        true
    }

    /// Consume the pending token without waiting
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait until a token is pending and consume it
    pub async fn wait(&self) {
        loop {
            let notified = self.waker.notified();
            if self.take() {
                return;
            }
            // A stale permit left by an already-drained token just loops again
            notified.await;
        }
    }
}
