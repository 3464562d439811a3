use std::fmt;

/// Fixed-size header preceding a datagram's entries: originating node,
/// sending process, and entry count. All fields are network byte order
/// (big-endian), written without struct padding — each field is
/// concatenated byte-for-byte, there is no peer to match a host layout
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub node_id: i32,
    pub proc_id: i32,
    pub dcount: i32,
}

impl UdpHeader {
    pub const ENCODED_LEN: usize = 12;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0..4].copy_from_slice(&self.node_id.to_be_bytes());
        buf[4..8].copy_from_slice(&self.proc_id.to_be_bytes());
        buf[8..12].copy_from_slice(&self.dcount.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DatagramCodecError> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(DatagramCodecError::Truncated {
                need: Self::ENCODED_LEN,
                have: buf.len(),
            });
        }
        Ok(Self {
            node_id: i32::from_be_bytes(buf[0..4].try_into().unwrap()),
            proc_id: i32::from_be_bytes(buf[4..8].try_into().unwrap()),
            dcount: i32::from_be_bytes(buf[8..12].try_into().unwrap()),
        })
    }
}

/// One `(id, value)` entry in a datagram's pack list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpEntry {
    pub id: i32,
    pub value: i64,
}

impl UdpEntry {
    pub const ENCODED_LEN: usize = 12;

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let mut buf = [0u8; Self::ENCODED_LEN];
        buf[0..4].copy_from_slice(&self.id.to_be_bytes());
        buf[4..12].copy_from_slice(&self.value.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, DatagramCodecError> {
        if buf.len() < Self::ENCODED_LEN {
            return Err(DatagramCodecError::Truncated {
                need: Self::ENCODED_LEN,
                have: buf.len(),
            });
        }
        Ok(Self {
            id: i32::from_be_bytes(buf[0..4].try_into().unwrap()),
            value: i64::from_be_bytes(buf[4..12].try_into().unwrap()),
        })
    }
}

/// Encode a full datagram: header followed by `dcount` entries back to
/// back. The caller is responsible for keeping `header.dcount` in sync
/// with `entries.len()`.
pub fn encode_datagram(header: &UdpHeader, entries: &[UdpEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(UdpHeader::ENCODED_LEN + entries.len() * UdpEntry::ENCODED_LEN);
    out.extend_from_slice(&header.encode());
    for e in entries {
        out.extend_from_slice(&e.encode());
    }
    out
}

/// Decode a full datagram, trusting the header's `dcount` but bounding it
/// by what's actually present in `buf`.
pub fn decode_datagram(buf: &[u8]) -> Result<(UdpHeader, Vec<UdpEntry>), DatagramCodecError> {
    let header = UdpHeader::decode(buf)?;
    if header.dcount < 0 {
        return Err(DatagramCodecError::NegativeCount(header.dcount));
    }
    let mut entries = Vec::with_capacity(header.dcount as usize);
    let mut pos = UdpHeader::ENCODED_LEN;
    for _ in 0..header.dcount {
        let entry = UdpEntry::decode(&buf[pos..])?;
        pos += UdpEntry::ENCODED_LEN;
        entries.push(entry);
    }
    Ok((header, entries))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramCodecError {
    Truncated { need: usize, have: usize },
    NegativeCount(i32),
}

impl fmt::Display for DatagramCodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { need, have } => {
                write!(f, "datagram truncated: need {need} bytes, have {have}")
            }
            Self::NegativeCount(n) => write!(f, "datagram header claims negative entry count {n}"),
        }
    }
}

impl std::error::Error for DatagramCodecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let h = UdpHeader {
            node_id: 100,
            proc_id: 7,
            dcount: 2,
        };
        let bytes = h.encode();
        assert_eq!(UdpHeader::decode(&bytes).unwrap(), h);
    }

    #[test]
    fn entry_round_trips_negative_values() {
        let e = UdpEntry { id: 42, value: -17 };
        let bytes = e.encode();
        assert_eq!(UdpEntry::decode(&bytes).unwrap(), e);
    }

    #[test]
    fn full_datagram_round_trips() {
        let header = UdpHeader {
            node_id: 1,
            proc_id: 2,
            dcount: 3,
        };
        let entries = vec![
            UdpEntry { id: 1, value: 10 },
            UdpEntry { id: 2, value: -20 },
            UdpEntry { id: 3, value: 30 },
        ];
        let bytes = encode_datagram(&header, &entries);
        let (got_header, got_entries) = decode_datagram(&bytes).unwrap();
        assert_eq!(got_header, header);
        assert_eq!(got_entries, entries);
    }

    #[test]
    fn truncated_header_is_rejected() {
        let err = UdpHeader::decode(&[0u8; 4]).unwrap_err();
        assert_eq!(
            err,
            DatagramCodecError::Truncated { need: 12, have: 4 }
        );
    }

    #[test]
    fn short_pack_list_is_rejected() {
        let header = UdpHeader {
            node_id: 1,
            proc_id: 1,
            dcount: 5,
        };
        let bytes = encode_datagram(&header, &[UdpEntry { id: 1, value: 1 }]);
        assert!(decode_datagram(&bytes).is_err());
    }
}
