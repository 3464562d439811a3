use tokio::sync::watch;

/// A single sink for shutdown requests, consumed by the event loop.
/// Replaces the legacy pattern of raising `SIGTERM` on the process
/// itself when SM becomes unrecoverable — process signals are reserved
/// for external termination only; internal callers request shutdown
/// through here instead.
#[derive(Clone)]
pub struct ShutdownSink {
    tx: watch::Sender<Option<String>>,
}

/// The receiving half, held by the event loop's select! and by any
/// session tasks that need to notice a gateway-wide shutdown.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Option<String>>,
}

pub fn channel() -> (ShutdownSink, ShutdownSignal) {
    let (tx, rx) = watch::channel(None);
    (ShutdownSink { tx }, ShutdownSignal { rx })
}

impl ShutdownSink {
    /// Requests an orderly shutdown with `reason`. Idempotent: the first
    /// call wins, later calls are ignored so the original reason is
    /// preserved.
    pub fn request_shutdown(&self, reason: impl Into<String>) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason.into());
            true
        });
    }
}

impl ShutdownSignal {
    pub fn is_requested(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.rx.borrow().clone()
    }

    /// Resolves once a shutdown has been requested.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(Option::is_some).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_resolves_after_request() {
        let (sink, mut signal) = channel();
        assert!(!signal.is_requested());
        sink.request_shutdown("SM unrecoverable");
        signal.wait().await;
        assert_eq!(signal.reason().as_deref(), Some("SM unrecoverable"));
    }

    #[test]
    fn first_request_wins() {
        let (sink, signal) = channel();
        sink.request_shutdown("first");
        sink.request_shutdown("second");
        assert_eq!(signal.reason().as_deref(), Some("first"));
    }
}
