//! Handshake query-string parsing for the WebSocket upgrade path, extending
//! `gateway_core::session_stream::parse_handshake`'s numeric-only grammar
//! with short-name resolution (`ask:T1,T2` as well as `ask:10,11`).

use crate::names::NameIndex;
use gateway_core::session_stream::HandshakeRequest;
use sensor_wire::{RespondFormat, SensorId};

/// Parses `s1,s2,…&format=json|txt|raw` where each `sN` is either a
/// numeric id or a short name. A token that resolves to nothing is
/// logged and skipped, not fatal — the handshake only fails if the
/// resulting set is empty while the original list was not, or the
/// format is unrecognized.
pub fn parse(query: &str, names: &NameIndex) -> Result<HandshakeRequest, String> {
    let mut csv = "";
    let mut format = RespondFormat::Json;
    for (i, part) in query.split('&').enumerate() {
        if let Some(value) = part.strip_prefix("format=") {
            format = value.parse().unwrap_or(RespondFormat::Unknown);
        } else if i == 0 {
            csv = part;
        }
    }
    if format == RespondFormat::Unknown {
        return Err("handshake: unknown format".into());
    }
    let sensor_ids = resolve_csv(csv, names);
    if sensor_ids.is_empty() {
        return Err("handshake: no sensor ids resolved".into());
    }
    Ok(HandshakeRequest { sensor_ids, format })
}

/// Resolves a comma-separated list of numeric ids and/or short names,
/// skipping tokens that resolve to nothing.
pub fn resolve_csv(csv: &str, names: &NameIndex) -> Vec<SensorId> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|token| {
            if let Ok(raw) = token.parse::<i64>() {
                return Some(SensorId(raw));
            }
            match names.resolve(token) {
                Some(id) => Some(id),
                None => {
                    tracing::warn!(token, "ws-gate: handshake referenced an unresolvable sensor, skipping");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn names() -> NameIndex {
        NameIndex::build(&[
            gateway_core::directory::SensorRecordConfig { name: "T1".into(), id: Some(10), fields: Map::new() },
            gateway_core::directory::SensorRecordConfig { name: "T2".into(), id: Some(11), fields: Map::new() },
        ])
    }

    #[test]
    fn resolves_mixed_numeric_and_name_tokens() {
        let hs = parse("10,T2&format=json", &names()).unwrap();
        assert_eq!(hs.sensor_ids, vec![SensorId(10), SensorId(11)]);
        assert_eq!(hs.format, RespondFormat::Json);
    }

    #[test]
    fn unresolvable_token_is_skipped_not_fatal() {
        let hs = parse("T1,bogus", &names()).unwrap();
        assert_eq!(hs.sensor_ids, vec![SensorId(10)]);
    }

    #[test]
    fn all_tokens_unresolvable_fails_the_handshake() {
        assert!(parse("bogus,alsobogus", &names()).is_err());
    }

    #[test]
    fn unknown_format_fails() {
        assert!(parse("10&format=xml", &names()).is_err());
    }

    #[test]
    fn empty_list_fails() {
        assert!(parse("&format=json", &names()).is_err());
    }
}
