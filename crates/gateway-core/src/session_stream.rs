use crate::egress::EgressQueue;
use crate::error::GatewayError;
use crate::session::{CancelFlag, SessionState};
use sensor_wire::{RespondFormat, SensorId};
use std::time::Instant;

/// A parsed ingress command from a stream peer. `.` (a bare ping byte)
/// is represented separately from `Unknown` since it is explicitly
/// ignored rather than logged as a protocol error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set(Vec<(SensorId, i64)>),
    Ask(Vec<SensorId>),
    Del(Vec<SensorId>),
    Ping,
    Unknown(String),
}

/// Parses one line-oriented command per the stream grammar:
/// `set:<id>=<v>[,...]`, `ask:<id>[,...]`, `del:<id>[,...]`, or a bare
/// `.` ping. Anything else comes back as `Unknown` for the caller to log
/// and drop.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line == "." {
        return Command::Ping;
    }
    if let Some(rest) = line.strip_prefix("set:") {
        let pairs: Option<Vec<(SensorId, i64)>> = rest
            .split(',')
            .map(|kv| {
                let (id, v) = kv.split_once('=')?;
                Some((SensorId(id.trim().parse().ok()?), v.trim().parse().ok()?))
            })
            .collect();
        return match pairs {
            Some(pairs) if !pairs.is_empty() => Command::Set(pairs),
            _ => Command::Unknown(line.to_string()),
        };
    }
    if let Some(rest) = line.strip_prefix("ask:") {
        return parse_id_list(rest).map(Command::Ask).unwrap_or_else(|| Command::Unknown(line.to_string()));
    }
    if let Some(rest) = line.strip_prefix("del:") {
        return parse_id_list(rest).map(Command::Del).unwrap_or_else(|| Command::Unknown(line.to_string()));
    }
    Command::Unknown(line.to_string())
}

fn parse_id_list(s: &str) -> Option<Vec<SensorId>> {
    let ids: Option<Vec<SensorId>> = s.split(',').map(|id| id.trim().parse().ok().map(SensorId)).collect();
    match ids {
        Some(ids) if !ids.is_empty() => Some(ids),
        _ => None,
    }
}

/// The parsed handshake query string: `s1,s2,…&format=json|txt|raw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub sensor_ids: Vec<SensorId>,
    pub format: RespondFormat,
}

/// Parses the WebSocket upgrade query string. An absent or empty sensor
/// list is rejected — the caller maps this to HTTP 400.
pub fn parse_handshake(query: &str) -> Result<HandshakeRequest, GatewayError> {
    let mut sensor_ids = Vec::new();
    let mut format = RespondFormat::Json;
    for (i, part) in query.split('&').enumerate() {
        if let Some(value) = part.strip_prefix("format=") {
            format = value.parse().unwrap_or(RespondFormat::Unknown);
        } else if i == 0 {
            sensor_ids = part
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse::<i64>().ok().map(SensorId))
                .collect();
        }
    }
    if sensor_ids.is_empty() {
        return Err(GatewayError::PeerProtocol(
            "handshake: empty sensor id list".into(),
        ));
    }
    if format == RespondFormat::Unknown {
        return Err(GatewayError::PeerProtocol("handshake: unknown format".into()));
    }
    Ok(HandshakeRequest { sensor_ids, format })
}

/// Per-session bookkeeping shared by the stream variant, independent of
/// the concrete transport (axum `WebSocket`, raw TCP, …) — the service
/// binary owns the actual socket and drives this state machine.
pub struct StreamSessionState {
    pub subscriber: SensorId,
    pub format: RespondFormat,
    pub queue: EgressQueue,
    pub state: SessionState,
    pub last_activity: Instant,
    pub cancel: CancelFlag,
}

impl StreamSessionState {
    pub fn new(subscriber: SensorId, format: RespondFormat, max_send: usize) -> Self {
        Self {
            subscriber,
            format,
            queue: EgressQueue::new(max_send),
            state: SessionState::New,
            last_activity: Instant::now(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn note_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn open(&mut self) {
        self.state = SessionState::Open;
    }

    pub fn begin_draining(&mut self) {
        if self.state == SessionState::Open {
            self.state = SessionState::Draining;
        }
    }

    /// Tears the session down: idempotent, releases queued buffers, and
    /// flips the monotonic cancellation flag.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.queue.release_all();
        self.state = SessionState::Closed;
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_set_with_multiple_assignments() {
        let cmd = parse_command("set:1=10,2=20");
        assert_eq!(cmd, Command::Set(vec![(SensorId(1), 10), (SensorId(2), 20)]));
    }

    #[test]
    fn parses_ask_and_del_lists() {
        assert_eq!(parse_command("ask:1,2,3"), Command::Ask(vec![SensorId(1), SensorId(2), SensorId(3)]));
        assert_eq!(parse_command("del:5"), Command::Del(vec![SensorId(5)]));
    }

    #[test]
    fn bare_dot_is_a_ping() {
        assert_eq!(parse_command("."), Command::Ping);
    }

    #[test]
    fn unrecognized_prefix_is_unknown() {
        assert_eq!(parse_command("frobnicate:1"), Command::Unknown("frobnicate:1".to_string()));
    }

    #[test]
    fn malformed_set_is_unknown_not_panicking() {
        assert_eq!(parse_command("set:abc"), Command::Unknown("set:abc".to_string()));
    }

    #[test]
    fn handshake_parses_ids_and_format() {
        let hs = parse_handshake("1,2,3&format=json").unwrap();
        assert_eq!(hs.sensor_ids, vec![SensorId(1), SensorId(2), SensorId(3)]);
        assert_eq!(hs.format, RespondFormat::Json);
    }

    #[test]
    fn handshake_defaults_to_json_without_format_param() {
        let hs = parse_handshake("1,2").unwrap();
        assert_eq!(hs.format, RespondFormat::Json);
    }

    #[test]
    fn handshake_rejects_empty_sensor_list() {
        assert!(parse_handshake("&format=json").is_err());
    }

    #[test]
    fn handshake_rejects_unknown_format() {
        assert!(parse_handshake("1,2&format=xml").is_err());
    }

    #[test]
    fn close_is_idempotent_and_releases_queue() {
        let mut state = StreamSessionState::new(SensorId(1), RespondFormat::Json, 10);
        state.queue.push(vec![1, 2, 3]);
        state.close();
        assert!(state.queue.is_empty());
        assert!(state.cancel.is_cancelled());
        state.close();
        assert_eq!(state.state, SessionState::Closed);
    }
}
