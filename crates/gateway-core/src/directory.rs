use crate::error::GatewayError;
use sensor_wire::SensorId;
use serde::Deserialize;

/// One candidate row in the declarative sensor configuration: either an
/// explicit numeric id or a short name to resolve, plus whatever
/// arbitrary fields the filter checks against.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorRecordConfig {
    pub name: String,
    pub id: Option<i64>,
    #[serde(default)]
    pub fields: std::collections::HashMap<String, String>,
}

/// The two admission filters from the directory's configured selection:
/// presence (`field` set, `value` absent) and equality (both set).
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub field: Option<String>,
    pub value: Option<String>,
}

impl FilterConfig {
    fn admits(&self, record: &SensorRecordConfig) -> bool {
        let Some(field) = &self.field else {
            return true;
        };
        let Some(present) = record.fields.get(field) else {
            return false;
        };
        match &self.value {
            Some(expected) => present == expected,
            None => !present.is_empty(),
        }
    }
}

/// A resolver from short sensor name to `SensorId`, supplied by the
/// caller — this crate has no knowledge of how names map to ids, that
/// mapping lives with SM's configuration surface.
pub trait NameResolver {
    fn resolve(&self, name: &str) -> Option<SensorId>;
}

/// One admitted, resolved directory entry. `pack_position` is only
/// meaningful to the datagram session variant; it is `None` for records
/// consulted by the stream variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: SensorId,
    pub pack_position: Option<usize>,
}

/// An immutable snapshot of the configured subscription set, built once
/// at startup from the declarative sensor records. Mutating the
/// directory requires re-init — there is no live-update path.
#[derive(Debug, Clone)]
pub struct SensorDirectory {
    entries: Vec<DirectoryEntry>,
}

impl SensorDirectory {
    /// Scans `records` in declaration order, admitting those that pass
    /// `filter`, resolving each admitted record's `SensorId` via `id` or
    /// `resolver`. A record whose id can't be resolved is a configuration
    /// error for that record only — it is skipped, not fatal to the whole
    /// directory, matching "failure to resolve is a configuration error
    /// reported and the record is skipped."
    pub fn build(
        records: &[SensorRecordConfig],
        filter: &FilterConfig,
        resolver: &dyn NameResolver,
        assign_pack_positions: bool,
    ) -> Result<Self, GatewayError> {
        let mut entries = Vec::new();
        let mut next_pos = 0usize;
        for record in records {
            if !filter.admits(record) {
                continue;
            }
            let id = match record.id {
                Some(raw) => SensorId(raw),
                None => match resolver.resolve(&record.name) {
                    Some(id) => id,
                    None => {
                        tracing::warn!(name = %record.name, "sensor directory: could not resolve short name, skipping record");
                        continue;
                    }
                },
            };
            let pack_position = if assign_pack_positions {
                let pos = next_pos;
                next_pos += 1;
                Some(pos)
            } else {
                None
            };
            entries.push(DirectoryEntry { id, pack_position });
        }
        if entries.is_empty() && !records.is_empty() {
            return Err(GatewayError::Config(
                "sensor directory: no records admitted".into(),
            ));
        }
        Ok(Self { entries })
    }

    /// Builds a directory directly from already-resolved entries,
    /// bypassing filtering and name resolution. Used by tests that only
    /// need a directory's pack-position shape.
    pub fn from_entries(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.entries.iter().map(|e| e.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResolver;
    impl NameResolver for StaticResolver {
        fn resolve(&self, name: &str) -> Option<SensorId> {
            match name {
                "T1" => Some(SensorId(1)),
                "T2" => Some(SensorId(2)),
                _ => None,
            }
        }
    }

    fn record(name: &str, fields: &[(&str, &str)]) -> SensorRecordConfig {
        SensorRecordConfig {
            name: name.to_string(),
            id: None,
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn filter_admit_scenario_from_spec() {
        let records = vec![
            record("T1", &[("iotype", "AI")]),
            record("T2", &[]),
        ];
        let filter = FilterConfig {
            field: Some("iotype".into()),
            value: Some("AI".into()),
        };
        let dir = SensorDirectory::build(&records, &filter, &StaticResolver, false).unwrap();
        assert_eq!(dir.ids().collect::<Vec<_>>(), vec![SensorId(1)]);
    }

    #[test]
    fn no_filter_admits_everything() {
        let records = vec![record("T1", &[]), record("T2", &[])];
        let dir = SensorDirectory::build(&records, &FilterConfig::default(), &StaticResolver, false).unwrap();
        assert_eq!(dir.entries().len(), 2);
    }

    #[test]
    fn presence_filter_requires_nonempty_field() {
        let records = vec![record("T1", &[("iotype", "")]), record("T2", &[("iotype", "AI")])];
        let filter = FilterConfig {
            field: Some("iotype".into()),
            value: None,
        };
        let dir = SensorDirectory::build(&records, &filter, &StaticResolver, false).unwrap();
        assert_eq!(dir.ids().collect::<Vec<_>>(), vec![SensorId(2)]);
    }

    #[test]
    fn unresolvable_name_is_skipped_not_fatal() {
        let records = vec![record("T1", &[]), record("unknown", &[])];
        let dir = SensorDirectory::build(&records, &FilterConfig::default(), &StaticResolver, false).unwrap();
        assert_eq!(dir.entries().len(), 1);
    }

    #[test]
    fn pack_positions_follow_declaration_order() {
        let records = vec![record("T1", &[]), record("T2", &[])];
        let dir = SensorDirectory::build(&records, &FilterConfig::default(), &StaticResolver, true).unwrap();
        assert_eq!(dir.entries()[0].pack_position, Some(0));
        assert_eq!(dir.entries()[1].pack_position, Some(1));
    }
}
