//! The boundary between the Sensor Event Gateway and the shared-memory
//! engine ("SM") that owns authoritative sensor state.
//!
//! SM itself — how it stores values, performs calibration, or serves
//! multiple processes — is out of scope here. This crate only describes
//! the shape of the interface the gateway core is generic over, so that
//! `gateway-core` never hardcodes a wire protocol to SM. Production
//! binaries link a real `SmHandle` implementation that speaks whatever
//! transport the deployment's SM exposes; tests and local demos link the
//! in-process `test-support` mock below.

mod error;
mod message;
#[cfg(any(test, feature = "test-support"))]
mod mock;

pub use error::SmError;
pub use message::{SmMessage, SystemCommand};

#[cfg(feature = "test-support")]
pub use mock::MockSm;

use async_trait::async_trait;
use sensor_wire::SensorId;
use std::time::Duration;

/// Everything the gateway core needs from SM: subscription control,
/// value writes, and the inbound message port.
///
/// Implementations must be cheaply cloneable (`Arc`-wrapped internally if
/// needed) since the event loop and session tasks share one handle.
#[async_trait]
pub trait SmHandle: Send + Sync + 'static {
    /// Subscribe to notifications for `id` on behalf of `subscriber`.
    async fn ask(&self, subscriber: SensorId, id: SensorId) -> Result<(), SmError>;

    /// Cancel a previous `ask`.
    async fn unask(&self, subscriber: SensorId, id: SensorId) -> Result<(), SmError>;

    /// Write `value` into SM's authoritative store for `id`.
    async fn set_value(&self, id: SensorId, value: i64) -> Result<(), SmError>;

    /// Block until the next message from SM arrives, or `timeout` elapses.
    /// A `None` return means the poll timed out with nothing pending —
    /// this is the common case on an idle loop tick, not an error.
    async fn poll_message(&self, timeout: Duration) -> Result<Option<SmMessage>, SmError>;

    /// True when the gateway and SM share a process (local mode). In this
    /// mode a `WatchDog` system command means nothing — SM can't have
    /// restarted without the gateway restarting too — so `IngressDispatcher`
    /// ignores it instead of reissuing `ask` for every registry entry.
    fn is_localwork(&self) -> bool;

    /// Block until SM answers readiness checks, or `timeout` elapses.
    /// Called once at startup; a timeout here is a fatal `SmError::NotReady`.
    async fn wait_sm_ready(&self, timeout: Duration) -> Result<(), SmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSm;

    #[tokio::test]
    async fn mock_answers_ready_immediately() {
        let sm = MockSm::new();
        sm.wait_sm_ready(Duration::from_millis(10)).await.unwrap();
    }

    #[tokio::test]
    async fn ask_then_unask_clears_subscription() {
        let sm = MockSm::new();
        let subscriber = SensorId(1);
        let sensor = SensorId(42);
        sm.ask(subscriber, sensor).await.unwrap();
        assert!(sm.is_subscribed(subscriber, sensor));
        sm.unask(subscriber, sensor).await.unwrap();
        assert!(!sm.is_subscribed(subscriber, sensor));
    }
}
