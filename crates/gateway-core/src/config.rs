use std::time::Duration;
use thiserror::Error;

/// Errors from loading and validating a gateway configuration. Each
/// service binary's own `config.rs` wraps TOML parsing into this same
/// shape, following the pattern of listing exactly what went wrong and
/// where.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// One of the configurable timeouts named in the concurrency model. A
/// negative source value means "wait indefinitely"; zero means "use the
/// default".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSpec {
    Indefinite,
    Bounded(Duration),
}

impl TimeoutSpec {
    /// Parses a raw millisecond value from config, substituting
    /// `default_ms` for an absent or zero value per "zero is treated as
    /// default".
    pub fn from_millis_field(raw: Option<i64>, default_ms: u64) -> Self {
        match raw {
            None | Some(0) => Self::Bounded(Duration::from_millis(default_ms)),
            Some(n) if n < 0 => Self::Indefinite,
            Some(n) => Self::Bounded(Duration::from_millis(n as u64)),
        }
    }

    /// `None` for `Indefinite` — callers skip wrapping the wait in
    /// `tokio::time::timeout` in that case rather than using a sentinel
    /// duration.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Indefinite => None,
            Self::Bounded(d) => Some(*d),
        }
    }
}

/// The timeout set named in §5: `smReadyTimeout`, `activateTimeout`,
/// `sessTimeout`, `cmdTimeout`, `outTimeout`, `pingSec`, `sendSec`.
/// Shared verbatim by every service binary; transport-specific fields
/// (host/port/broadcast, httpserver-*, …) live in each binary's own
/// config type, which embeds this one.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutsConfig {
    pub sm_ready: TimeoutSpec,
    pub activate: TimeoutSpec,
    pub session: TimeoutSpec,
    pub command: TimeoutSpec,
    pub output: TimeoutSpec,
    pub ping: TimeoutSpec,
    pub send: TimeoutSpec,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            sm_ready: TimeoutSpec::Bounded(Duration::from_secs(15)),
            activate: TimeoutSpec::Bounded(Duration::from_secs(20)),
            session: TimeoutSpec::Bounded(Duration::from_secs(60)),
            command: TimeoutSpec::Bounded(Duration::from_secs(10)),
            output: TimeoutSpec::Bounded(Duration::from_secs(10)),
            ping: TimeoutSpec::Bounded(Duration::from_secs(3)),
            send: TimeoutSpec::Bounded(Duration::from_secs(1)),
        }
    }
}

/// Clamps a configured send interval: `sendTime=0` or negative is
/// rejected/clamped to `default_ms` at init, per the boundary behavior
/// in §8.
pub fn clamp_send_time(raw_ms: i64, default_ms: u64) -> Duration {
    if raw_ms <= 0 {
        Duration::from_millis(default_ms)
    } else {
        Duration::from_millis(raw_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_timeout_means_indefinite() {
        assert_eq!(TimeoutSpec::from_millis_field(Some(-1), 1000), TimeoutSpec::Indefinite);
    }

    #[test]
    fn zero_or_absent_falls_back_to_default() {
        assert_eq!(
            TimeoutSpec::from_millis_field(Some(0), 1000),
            TimeoutSpec::Bounded(Duration::from_millis(1000))
        );
        assert_eq!(
            TimeoutSpec::from_millis_field(None, 1000),
            TimeoutSpec::Bounded(Duration::from_millis(1000))
        );
    }

    #[test]
    fn positive_value_is_used_verbatim() {
        assert_eq!(
            TimeoutSpec::from_millis_field(Some(500), 1000),
            TimeoutSpec::Bounded(Duration::from_millis(500))
        );
    }

    #[test]
    fn send_time_zero_or_negative_clamps_to_default() {
        assert_eq!(clamp_send_time(0, 250), Duration::from_millis(250));
        assert_eq!(clamp_send_time(-5, 250), Duration::from_millis(250));
        assert_eq!(clamp_send_time(100, 250), Duration::from_millis(100));
    }
}
