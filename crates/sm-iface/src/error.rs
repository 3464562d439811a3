use thiserror::Error;

/// Failures surfaced by an `SmHandle`. These map directly onto the
/// gateway-core error variants that care about SM specifically
/// (`SMUnreadyError`, `SMCallError`).
#[derive(Debug, Error)]
pub enum SmError {
    #[error("SM did not become ready within the configured timeout")]
    NotReady,

    #[error("SM call failed: {0}")]
    CallFailed(String),

    #[error("SM transport unavailable: {0}")]
    Unavailable(String),
}
