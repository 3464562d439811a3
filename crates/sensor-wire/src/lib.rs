//! sensor-wire: sensor data model and wire encodings for the Sensor Event
//! Gateway.
//!
//! This crate carries no I/O and no subscription state — it only describes
//! the shapes that cross the wire (datagram bytes, WebSocket text frames)
//! and the in-memory snapshot type that `gateway-core` caches and packs.

mod calibration;
mod datagram;
mod format;
mod id;
mod snapshot;

pub use calibration::Calibration;
pub use datagram::{decode_datagram, encode_datagram, DatagramCodecError, UdpEntry, UdpHeader};
pub use format::{JsonCalibration, JsonSnapshot, RawDecoded, RespondFormat, raw_decode, raw_encode, txt_encode};
pub use id::SensorId;
pub use snapshot::{SensorKind, SensorSnapshot, Timestamp};
