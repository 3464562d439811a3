use sensor_wire::SensorId;
use sm_iface::SmHandle;
use std::time::Duration;

/// Periodic writer of a liveness counter into SM. Absent configuration
/// disables H entirely — callers fall back to observing a well-known
/// `TestMode_S` sensor for SM liveness instead (that observation is a
/// normal `ask`/cache read, not something this type does).
pub struct HeartbeatEmitter {
    sensor_id: SensorId,
    ceiling: i64,
    period: Duration,
}

impl HeartbeatEmitter {
    pub fn new(sensor_id: SensorId, ceiling: i64, period: Duration) -> Self {
        Self { sensor_id, ceiling, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Writes the ceiling value to SM. SM is expected to decrement it on
    /// its own schedule; a failed write here is simply retried on the
    /// next tick by the caller — this never escalates.
    pub async fn beat<SM: SmHandle>(&self, sm: &SM) -> Result<(), sm_iface::SmError> {
        sm.set_value(self.sensor_id, self.ceiling).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_iface::MockSm;

    #[tokio::test]
    async fn beat_writes_the_ceiling_value() {
        let sm = MockSm::new();
        let h = HeartbeatEmitter::new(SensorId(99), 10, Duration::from_secs(5));
        h.beat(&sm).await.unwrap();
        assert_eq!(sm.value_of(SensorId(99)), Some(10));
    }
}
