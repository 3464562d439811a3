//! UDP sender configuration loading.
//!
//! TOML is the sole config source. Default config path:
//! `/etc/sensor-gateway/udp-sender.toml`.

use gateway_core::config::{clamp_send_time, ConfigError, TimeoutSpec};
use gateway_core::directory::{FilterConfig, SensorRecordConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UdpSenderConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub broadcast: bool,
    pub send_time: Duration,
    pub send_timeout: TimeoutSpec,
    pub node_id: i32,
    pub proc_id: i32,
    pub filter: FilterConfig,
    pub heartbeat_id: Option<i64>,
    pub heartbeat_max: i64,
    pub heartbeat_time: Duration,
    pub sm_ready_timeout: TimeoutSpec,
    pub activate_timeout: TimeoutSpec,
    pub sensors: Vec<SensorRecordConfig>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    name: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    broadcast: Option<bool>,
    #[serde(rename = "send-time")]
    send_time: Option<i64>,
    #[serde(rename = "send-timeout")]
    send_timeout: Option<i64>,
    #[serde(rename = "node-id")]
    node_id: Option<i32>,
    #[serde(rename = "proc-id")]
    proc_id: Option<i32>,
    #[serde(rename = "filter-field")]
    filter_field: Option<String>,
    #[serde(rename = "filter-value")]
    filter_value: Option<String>,
    #[serde(rename = "heartbeat-id")]
    heartbeat_id: Option<i64>,
    #[serde(rename = "heartbeat-max")]
    heartbeat_max: Option<i64>,
    #[serde(rename = "heartbeat-time")]
    heartbeat_time: Option<i64>,
    #[serde(rename = "sm-ready-timeout")]
    sm_ready_timeout: Option<i64>,
    #[serde(rename = "activate-timeout")]
    activate_timeout: Option<i64>,
    #[serde(rename = "sensors")]
    sensors: Option<Vec<SensorRecordConfig>>,
}

pub fn load_config_from_path(path: &Path) -> Result<UdpSenderConfig, ConfigError> {
    let toml_str =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<UdpSenderConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/sensor-gateway/udp-sender.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<UdpSenderConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str)?;

    let name = raw.name.ok_or(ConfigError::MissingField("name"))?;
    let host = raw.host.unwrap_or_else(|| "127.0.0.1".to_owned());
    let port = raw.port.ok_or(ConfigError::MissingField("port"))?;
    let send_time = clamp_send_time(raw.send_time.unwrap_or(0), 1000);

    Ok(UdpSenderConfig {
        name,
        host,
        port,
        broadcast: raw.broadcast.unwrap_or(false),
        send_time,
        send_timeout: TimeoutSpec::from_millis_field(raw.send_timeout, 1000),
        node_id: raw.node_id.unwrap_or(0),
        proc_id: raw.proc_id.unwrap_or(0),
        filter: FilterConfig {
            field: raw.filter_field,
            value: raw.filter_value,
        },
        heartbeat_id: raw.heartbeat_id,
        heartbeat_max: raw.heartbeat_max.unwrap_or(10),
        heartbeat_time: Duration::from_millis(raw.heartbeat_time.unwrap_or(3000).max(0) as u64),
        sm_ready_timeout: TimeoutSpec::from_millis_field(raw.sm_ready_timeout, 15_000),
        activate_timeout: TimeoutSpec::from_millis_field(raw.activate_timeout, 20_000),
        sensors: raw.sensors.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = load_config_from_str(
            r#"
            name = "udp1"
            port = 4444
            "#,
        )
        .unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.send_time, Duration::from_millis(1000));
        assert_eq!(cfg.heartbeat_max, 10);
    }

    #[test]
    fn missing_name_is_an_error() {
        let err = load_config_from_str("port = 1234").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("name")));
    }

    #[test]
    fn negative_send_time_clamps_to_default() {
        let cfg = load_config_from_str(
            r#"
            name = "udp1"
            port = 4444
            send-time = -5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.send_time, Duration::from_millis(1000));
    }

    #[test]
    fn filter_fields_are_parsed() {
        let cfg = load_config_from_str(
            r#"
            name = "udp1"
            port = 4444
            filter-field = "iotype"
            filter-value = "AI"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.filter.field.as_deref(), Some("iotype"));
        assert_eq!(cfg.filter.value.as_deref(), Some("AI"));
    }
}
