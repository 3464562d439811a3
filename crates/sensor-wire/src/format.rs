use crate::{SensorId, SensorKind, SensorSnapshot};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The response flavor negotiated over the `format=` query parameter on the
/// WebSocket gate's handshake URL, e.g. `ws://host:port/wsgate/?s1,s2&format=json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RespondFormat {
    #[default]
    Json,
    Txt,
    Raw,
    Unknown,
}

impl FromStr for RespondFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "txt" | "text" => Self::Txt,
            "raw" => Self::Raw,
            _ => Self::Unknown,
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JsonCalibration {
    pub cmin: f64,
    pub cmax: f64,
    pub rmin: i64,
    pub rmax: i64,
    pub precision: i32,
}

/// The JSON object emitted for a single sensor update, matching the wire
/// shape consumers of the `format=json` gate expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSnapshot {
    pub error: Option<String>,
    pub id: i64,
    pub value: i64,
    pub name: Option<String>,
    pub sm_tv_sec: i64,
    pub sm_tv_nsec: i32,
    #[serde(rename = "type")]
    pub kind: SensorKind,
    pub undefined: bool,
    pub supplier: i64,
    pub tv_sec: i64,
    pub tv_nsec: i32,
    pub node: i32,
    pub calibration: Option<JsonCalibration>,
}

impl JsonSnapshot {
    pub fn from_snapshot(snap: &SensorSnapshot, name: Option<String>, error: Option<String>) -> Self {
        Self {
            error,
            id: snap.id.0,
            value: snap.value,
            name,
            sm_tv_sec: snap.sm_time.sec,
            sm_tv_nsec: snap.sm_time.nsec,
            kind: snap.kind,
            undefined: snap.undefined,
            supplier: snap.supplier.0,
            tv_sec: snap.tm_time.sec,
            tv_nsec: snap.tm_time.nsec,
            node: snap.node,
            calibration: snap.calibration.map(|c| JsonCalibration {
                cmin: c.cal_min,
                cmax: c.cal_max,
                rmin: c.raw_min,
                rmax: c.raw_max,
                precision: c.precision,
            }),
        }
    }
}

/// Renders a snapshot the way `format=txt` clients expect: a human-readable
/// timestamp, the sensor id, and either an error or a value — one line per
/// update, newline-terminated.
pub fn txt_encode(snap: &SensorSnapshot, error: Option<&str>) -> String {
    let nanos = snap.tm_time.sec.saturating_mul(1_000_000_000) + i64::from(snap.tm_time.nsec);
    match error {
        Some(msg) => format!("{}({}) id={} error={}\n", snap.tm_time.sec, nanos, snap.id, msg),
        None => format!(
            "{}({}) id={} value={}\n",
            snap.tm_time.sec, nanos, snap.id, snap.value
        ),
    }
}

/// Encodes a snapshot as the fixed-width binary payload `format=raw` clients
/// read directly off the socket: `id`, `value`, `undefined` (as 0/1), each
/// big-endian.
pub fn raw_encode(snap: &SensorSnapshot) -> Vec<u8> {
    let mut buf = Vec::with_capacity(17);
    buf.extend_from_slice(&snap.id.0.to_be_bytes());
    buf.extend_from_slice(&snap.value.to_be_bytes());
    buf.push(u8::from(snap.undefined));
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDecoded {
    pub id: SensorId,
    pub value: i64,
    pub undefined: bool,
}

pub fn raw_decode(buf: &[u8]) -> Option<RawDecoded> {
    if buf.len() < 17 {
        return None;
    }
    Some(RawDecoded {
        id: SensorId(i64::from_be_bytes(buf[0..8].try_into().unwrap())),
        value: i64::from_be_bytes(buf[8..16].try_into().unwrap()),
        undefined: buf[16] != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<RespondFormat>().unwrap(), RespondFormat::Json);
        assert_eq!("Raw".parse::<RespondFormat>().unwrap(), RespondFormat::Raw);
        assert_eq!("bogus".parse::<RespondFormat>().unwrap(), RespondFormat::Unknown);
    }

    #[test]
    fn default_format_is_json() {
        assert_eq!(RespondFormat::default(), RespondFormat::Json);
    }

    fn sample_snapshot() -> SensorSnapshot {
        SensorSnapshot {
            id: SensorId(5),
            value: 123,
            undefined: false,
            supplier: SensorId(1),
            node: 1,
            sm_time: Timestamp::new(1000, 0),
            tm_time: Timestamp::new(1000, 500),
            kind: SensorKind::AnalogInput,
            calibration: None,
        }
    }

    #[test]
    fn txt_encode_reports_value_without_error() {
        let line = txt_encode(&sample_snapshot(), None);
        assert!(line.contains("id=5"));
        assert!(line.contains("value=123"));
        assert!(!line.contains("error"));
    }

    #[test]
    fn txt_encode_reports_error_instead_of_value() {
        let line = txt_encode(&sample_snapshot(), Some("sm unavailable"));
        assert!(line.contains("error=sm unavailable"));
        assert!(!line.contains("value="));
    }

    #[test]
    fn raw_round_trips() {
        let snap = sample_snapshot();
        let bytes = raw_encode(&snap);
        let decoded = raw_decode(&bytes).unwrap();
        assert_eq!(decoded.id, snap.id);
        assert_eq!(decoded.value, snap.value);
        assert_eq!(decoded.undefined, snap.undefined);
    }

    #[test]
    fn raw_decode_rejects_short_buffers() {
        assert!(raw_decode(&[0u8; 4]).is_none());
    }
}
