use crate::{Calibration, SensorId};
use serde::{Deserialize, Serialize};

/// Sensor category, carried through but not interpreted by the gateway core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    DigitalInput,
    DigitalOutput,
    AnalogInput,
    AnalogOutput,
}

/// A logical-clock timestamp as used by SM (`sm_tv_sec`/`sm_tv_nsec` in the
/// JSON wire format). Ordered lexicographically on `(sec, nsec)`, which is
/// the ordering `ValueCache` uses to decide last-writer-wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub sec: i64,
    pub nsec: i32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { sec: 0, nsec: 0 };

    pub fn new(sec: i64, nsec: i32) -> Self {
        Self { sec, nsec }
    }
}

/// An immutable snapshot of a single sensor value, as produced by the
/// ingress dispatcher from an SM notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub id: SensorId,
    pub value: i64,
    pub undefined: bool,
    pub supplier: SensorId,
    pub node: i32,
    /// SM's logical clock at the time of the update — the ordering key for
    /// last-writer-wins in `ValueCache`.
    pub sm_time: Timestamp,
    /// Local receipt time, carried through to the JSON/TXT wire formats but
    /// not used for cache ordering.
    pub tm_time: Timestamp,
    pub kind: SensorKind,
    pub calibration: Option<Calibration>,
}

impl SensorSnapshot {
    /// A synthetic snapshot for surfacing an `SMCallError` to subscribers:
    /// undefined value, the error text carried separately by the caller.
    pub fn undefined_for(id: SensorId, node: i32) -> Self {
        Self {
            id,
            value: 0,
            undefined: true,
            supplier: SensorId::NONE,
            node,
            sm_time: Timestamp::ZERO,
            tm_time: Timestamp::ZERO,
            kind: SensorKind::AnalogInput,
            calibration: None,
        }
    }
}
