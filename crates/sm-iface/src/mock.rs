use crate::{SmError, SmHandle, SmMessage};
use async_trait::async_trait;
use sensor_wire::SensorId;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// An in-process stand-in for SM, used by tests and by service binaries
/// run in demo/standalone mode where no real SM deployment is reachable.
///
/// This is deliberately not a network protocol — it exists purely to let
/// `gateway-core` be exercised without a real SM. Production deployments
/// supply their own `SmHandle` that speaks to the actual shared memory
/// engine.
pub struct MockSm {
    subscriptions: StdMutex<HashSet<(SensorId, SensorId)>>,
    values: StdMutex<HashMap<SensorId, i64>>,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<SmMessage>>,
    inbox_tx: mpsc::UnboundedSender<SmMessage>,
    localwork: bool,
}

impl MockSm {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            subscriptions: StdMutex::new(HashSet::new()),
            values: StdMutex::new(HashMap::new()),
            inbox: AsyncMutex::new(rx),
            inbox_tx: tx,
            localwork: true,
        }
    }

    pub fn remote() -> Self {
        Self {
            localwork: false,
            ..Self::new()
        }
    }

    /// A handle tests use to push messages as if SM had sent them.
    pub fn injector(&self) -> mpsc::UnboundedSender<SmMessage> {
        self.inbox_tx.clone()
    }

    pub fn is_subscribed(&self, subscriber: SensorId, id: SensorId) -> bool {
        self.subscriptions.lock().unwrap().contains(&(subscriber, id))
    }

    pub fn value_of(&self, id: SensorId) -> Option<i64> {
        self.values.lock().unwrap().get(&id).copied()
    }

    /// Simulates an SM restart from the subscriber's point of view: every
    /// previously granted subscription is forgotten. Used to exercise the
    /// remote-mode `WatchDog` re-ask path.
    pub fn clear_subscriptions(&self) {
        self.subscriptions.lock().unwrap().clear();
    }
}

impl Default for MockSm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SmHandle for MockSm {
    async fn ask(&self, subscriber: SensorId, id: SensorId) -> Result<(), SmError> {
        self.subscriptions.lock().unwrap().insert((subscriber, id));
        Ok(())
    }

    async fn unask(&self, subscriber: SensorId, id: SensorId) -> Result<(), SmError> {
        self.subscriptions.lock().unwrap().remove(&(subscriber, id));
        Ok(())
    }

    async fn set_value(&self, id: SensorId, value: i64) -> Result<(), SmError> {
        self.values.lock().unwrap().insert(id, value);
        Ok(())
    }

    async fn poll_message(&self, timeout: Duration) -> Result<Option<SmMessage>, SmError> {
        let mut inbox = self.inbox.lock().await;
        match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => Err(SmError::Unavailable("SM message channel closed".into())),
            Err(_elapsed) => Ok(None),
        }
    }

    fn is_localwork(&self) -> bool {
        self.localwork
    }

    async fn wait_sm_ready(&self, _timeout: Duration) -> Result<(), SmError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_value_is_observable_locally() {
        let sm = MockSm::new();
        sm.set_value(SensorId(1), 99).await.unwrap();
        assert_eq!(sm.value_of(SensorId(1)), Some(99));
    }

    #[tokio::test]
    async fn poll_times_out_when_nothing_injected() {
        let sm = MockSm::new();
        let got = sm.poll_message(Duration::from_millis(5)).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn poll_returns_an_injected_message() {
        let sm = MockSm::new();
        sm.injector()
            .send(SmMessage::System(crate::SystemCommand::WatchDog))
            .unwrap();
        let got = sm.poll_message(Duration::from_millis(50)).await.unwrap();
        assert!(matches!(got, Some(SmMessage::System(crate::SystemCommand::WatchDog))));
    }
}
