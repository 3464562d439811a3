//! Short-name resolution for handshake sensor lists. The original
//! `getSInfoList` accepts either a comma-separated list of short names
//! resolved through the shared-memory directory, or raw numeric ids; SM's
//! name service is out of scope here, so names are resolved against the
//! same `[[sensors]]` records the gateway's own directory was built from.

use gateway_core::directory::SensorRecordConfig;
use sensor_wire::SensorId;
use std::collections::HashMap;

pub struct NameIndex {
    by_name: HashMap<String, SensorId>,
    by_id: HashMap<SensorId, String>,
}

impl NameIndex {
    pub fn build(records: &[SensorRecordConfig]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_id = HashMap::new();
        for record in records {
            if let Some(raw) = record.id {
                let id = SensorId(raw);
                by_name.insert(record.name.clone(), id);
                by_id.insert(id, record.name.clone());
            }
        }
        Self { by_name, by_id }
    }

    pub fn resolve(&self, name: &str) -> Option<SensorId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: SensorId) -> Option<String> {
        self.by_id.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, id: i64) -> SensorRecordConfig {
        SensorRecordConfig {
            name: name.to_string(),
            id: Some(id),
            fields: HashMap::new(),
        }
    }

    #[test]
    fn resolves_name_to_id_and_back() {
        let idx = NameIndex::build(&[record("T1", 10), record("T2", 11)]);
        assert_eq!(idx.resolve("T1"), Some(SensorId(10)));
        assert_eq!(idx.name_of(SensorId(11)), Some("T2".to_string()));
    }

    #[test]
    fn unresolvable_name_is_none() {
        let idx = NameIndex::build(&[record("T1", 10)]);
        assert_eq!(idx.resolve("unknown"), None);
    }
}
