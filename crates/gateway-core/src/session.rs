use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handshake-state transitions: `New -> Open -> Draining -> Closed` for
/// stream sessions; the datagram variant only ever uses `Open`/`Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Open,
    Draining,
    Closed,
}

/// A monotonic cancellation flag, shared between a session's owning
/// event-loop task and any off-loop code that needs to observe
/// teardown (e.g. the HTTP accept path). Once set it never clears;
/// setting it twice is a no-op.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The capability set shared by stream, datagram and log sessions:
/// open, enqueue, drain, close. Stream/datagram/log sessions implement
/// this directly rather than through a deep inheritance hierarchy —
/// each owns its transport and its own `EgressQueue`.
pub trait Session {
    /// Serializes and enqueues a notification for this session's
    /// `RespondFormat`. A `false` return means the queue dropped the
    /// event (hard cap reached); this is not an error.
    fn enqueue(&self, bytes: Vec<u8>) -> bool;

    /// Drains up to the session's configured `max_send` buffers to the
    /// transport. Returns the number written.
    fn drain(&mut self) -> impl std::future::Future<Output = std::io::Result<usize>> + Send;

    /// Monotonic teardown: stops timers, releases queued buffers, closes
    /// the transport, and flips `cancel_flag`. Idempotent.
    fn close(&mut self);

    fn state(&self) -> SessionState;

    fn cancel_flag(&self) -> &CancelFlag;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_monotonic_and_idempotent() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn cloned_flag_observes_cancellation() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        flag.cancel();
        assert!(observer.is_cancelled());
    }
}
