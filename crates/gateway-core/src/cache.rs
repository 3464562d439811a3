use sensor_wire::{SensorId, SensorSnapshot};
use std::collections::HashMap;
use std::sync::RwLock;

/// Last-known value, timestamp, calibration and liveness flag per
/// subscribed sensor id. Writes happen only from the event-loop task;
/// readers (serializers) take a short read lock per lookup — there is no
/// cross-entry atomicity, a datagram may mix values from different
/// update generations, matching the source's per-entry critical section.
#[derive(Default)]
pub struct ValueCache {
    entries: RwLock<HashMap<SensorId, SensorSnapshot>>,
}

impl ValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts `snapshot` only if it is newer under SM's logical clock
    /// than what is currently cached for this id (last-writer-wins).
    /// Returns `true` if the cache was updated.
    pub fn update(&self, snapshot: SensorSnapshot) -> bool {
        let mut entries = self.entries.write().unwrap();
        match entries.get(&snapshot.id) {
            Some(current) if snapshot.sm_time < current.sm_time => false,
            _ => {
                entries.insert(snapshot.id, snapshot);
                true
            }
        }
    }

    pub fn get(&self, id: SensorId) -> Option<SensorSnapshot> {
        self.entries.read().unwrap().get(&id).cloned()
    }

    pub fn remove(&self, id: SensorId) {
        self.entries.write().unwrap().remove(&id);
    }

    pub fn contains(&self, id: SensorId) -> bool {
        self.entries.read().unwrap().contains_key(&id)
    }
}
