use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque sensor identifier.
///
/// `SensorId::NONE` is the sentinel used throughout the gateway for "no
/// sensor resolved" — e.g. a directory record whose short name failed to
/// resolve, or a pack position with nothing assigned yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorId(pub i64);

impl SensorId {
    pub const NONE: SensorId = SensorId(-1);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for SensorId {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_the_default() {
        assert_eq!(SensorId::default(), SensorId::NONE);
        assert!(SensorId::NONE.is_none());
        assert!(!SensorId(42).is_none());
    }

    #[test]
    fn ordering_follows_inner_value() {
        assert!(SensorId(1) < SensorId(2));
    }
}
