//! log-session configuration loading.
//!
//! TOML is the sole config source. Default config path:
//! `/etc/sensor-gateway/log-session.toml`.

use crate::tail::LogFileConfig;
use gateway_core::config::{clamp_send_time, ConfigError, TimeoutSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LogSessionConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub max_sessions: usize,
    pub session_timeout: TimeoutSpec,
    pub send_time: Duration,
    pub max_send: usize,
    pub sm_ready_timeout: TimeoutSpec,
    pub tail_poll_interval: Duration,
    pub logs: Vec<LogFileConfig>,
}

#[derive(Debug, Deserialize)]
struct RawLogEntry {
    name: String,
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    #[serde(rename = "max-sessions")]
    max_sessions: Option<usize>,
    #[serde(rename = "session-timeout")]
    session_timeout: Option<i64>,
    #[serde(rename = "send-time")]
    send_time: Option<i64>,
    #[serde(rename = "max-send")]
    max_send: Option<usize>,
    #[serde(rename = "sm-ready-timeout")]
    sm_ready_timeout: Option<i64>,
    #[serde(rename = "tail-poll-interval")]
    tail_poll_interval: Option<i64>,
    logs: Option<Vec<RawLogEntry>>,
}

pub fn load_config_from_path(path: &Path) -> Result<LogSessionConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<LogSessionConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/sensor-gateway/log-session.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<LogSessionConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str)?;

    let name = raw.name.ok_or(ConfigError::MissingField("name"))?;
    let port = raw.port.ok_or(ConfigError::MissingField("port"))?;
    let send_time = clamp_send_time(raw.send_time.unwrap_or(0), 500);
    let tail_poll_interval = clamp_send_time(raw.tail_poll_interval.unwrap_or(0), 500);

    Ok(LogSessionConfig {
        name,
        host: raw.host.unwrap_or_else(|| "0.0.0.0".to_owned()),
        port,
        max_sessions: raw.max_sessions.unwrap_or(32),
        session_timeout: TimeoutSpec::from_millis_field(raw.session_timeout, 60_000),
        send_time,
        max_send: raw.max_send.unwrap_or(20),
        sm_ready_timeout: TimeoutSpec::from_millis_field(raw.sm_ready_timeout, 15_000),
        tail_poll_interval,
        logs: raw
            .logs
            .unwrap_or_default()
            .into_iter()
            .map(|e| LogFileConfig { name: e.name, path: e.path })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = load_config_from_str(
            r#"
            name = "logsrv1"
            port = 5555
            "#,
        )
        .unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.max_sessions, 32);
        assert_eq!(cfg.send_time, Duration::from_millis(500));
        assert!(cfg.logs.is_empty());
    }

    #[test]
    fn missing_name_is_an_error() {
        let err = load_config_from_str("port = 1234").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("name")));
    }

    #[test]
    fn missing_port_is_an_error() {
        let err = load_config_from_str(r#"name = "x""#).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("port")));
    }

    #[test]
    fn negative_send_time_clamps_to_default() {
        let cfg = load_config_from_str(
            r#"
            name = "logsrv1"
            port = 5555
            send-time = -5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.send_time, Duration::from_millis(500));
    }

    #[test]
    fn logs_table_is_parsed() {
        let cfg = load_config_from_str(
            r#"
            name = "logsrv1"
            port = 5555

            [[logs]]
            name = "main"
            path = "/var/log/sm/main.log"

            [[logs]]
            name = "alarm"
            path = "/var/log/sm/alarm.log"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.logs.len(), 2);
        assert_eq!(cfg.logs[0].name, "main");
        assert_eq!(cfg.logs[1].path, PathBuf::from("/var/log/sm/alarm.log"));
    }

    #[test]
    fn session_timeout_negative_means_indefinite() {
        let cfg = load_config_from_str(
            r#"
            name = "logsrv1"
            port = 5555
            session-timeout = -1
            "#,
        )
        .unwrap();
        assert_eq!(cfg.session_timeout, TimeoutSpec::Indefinite);
    }
}
