use thiserror::Error;

/// The error kinds named in the gateway's error-handling design: each one
/// carries a fixed propagation policy (see variant docs), enforced by
/// callers rather than by this type itself.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or invalid configuration. Fatal during init.
    #[error("configuration error: {0}")]
    Config(String),

    /// SM did not become ready within its timeout. Fatal on startup,
    /// self-terminating at runtime.
    #[error("SM not ready: {0}")]
    SmUnready(String),

    /// A single ask/unask/set failed. Captured into the entry's
    /// `last_error` and surfaced to subscribers as a synthetic event —
    /// never escalates on its own.
    #[error("SM call failed: {0}")]
    SmCall(String),

    /// Socket/protocol failure on one session. Tears down that session
    /// only.
    #[error("transport error: {0}")]
    Transport(String),

    /// A Q enqueue hit the hard cap. The event is dropped; this is
    /// logged once per overflow episode, not surfaced to the peer.
    #[error("egress queue overflow")]
    QueueOverflow,

    /// A malformed command from a peer. Logged; the session continues.
    #[error("peer protocol error: {0}")]
    PeerProtocol(String),

    /// An invariant the gateway relies on was violated. Logs and
    /// requests process termination.
    #[error("fatal invariant violation: {0}")]
    FatalInvariant(String),
}

impl GatewayError {
    /// True for the two kinds that escalate to process termination per
    /// the propagation policy; everything else is recovered locally or
    /// promoted to session teardown.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SmUnready(_) | Self::FatalInvariant(_))
    }
}
