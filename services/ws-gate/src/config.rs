//! ws-gate configuration loading.
//!
//! TOML is the sole config source. Default config path:
//! `/etc/sensor-gateway/ws-gate.toml`.

use gateway_core::config::{ConfigError, TimeoutSpec};
use gateway_core::directory::{FilterConfig, SensorRecordConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WsGateConfig {
    pub name: String,
    pub prefix: String,
    pub httpserver_host: String,
    pub httpserver_port: u16,
    pub httpserver_max_queued: usize,
    pub httpserver_max_threads: usize,
    pub httpserver_cors_allow: String,
    pub ws_max: usize,
    pub ws_heartbeat_time: Duration,
    pub ws_send_time: Duration,
    pub ws_max_send: usize,
    pub filter: FilterConfig,
    pub heartbeat_id: Option<i64>,
    pub heartbeat_max: i64,
    pub heartbeat_time: Duration,
    pub sm_ready_timeout: TimeoutSpec,
    pub activate_timeout: TimeoutSpec,
    pub session_timeout: TimeoutSpec,
    pub sensors: Vec<SensorRecordConfig>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    name: Option<String>,
    prefix: Option<String>,
    #[serde(rename = "httpserver-host")]
    httpserver_host: Option<String>,
    #[serde(rename = "httpserver-port")]
    httpserver_port: Option<u16>,
    #[serde(rename = "httpserver-max-queued")]
    httpserver_max_queued: Option<usize>,
    #[serde(rename = "httpserver-max-threads")]
    httpserver_max_threads: Option<usize>,
    #[serde(rename = "httpserver-cors-allow")]
    httpserver_cors_allow: Option<String>,
    #[serde(rename = "ws-max")]
    ws_max: Option<usize>,
    #[serde(rename = "ws-heartbeat-time")]
    ws_heartbeat_time: Option<i64>,
    #[serde(rename = "ws-send-time")]
    ws_send_time: Option<i64>,
    #[serde(rename = "ws-max-send")]
    ws_max_send: Option<usize>,
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
    #[serde(rename = "sess-timeout")]
    sess_timeout: Option<i64>,
    sensors: Option<Vec<SensorRecordConfig>>,
}

pub fn load_config_from_path(path: &Path) -> Result<WsGateConfig, ConfigError> {
    let toml_str =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
    load_config_from_str(&toml_str)
}

pub fn load_config() -> Result<WsGateConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/sensor-gateway/ws-gate.toml"))
}

pub fn load_config_from_str(toml_str: &str) -> Result<WsGateConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str)?;

    let name = raw.name.ok_or(ConfigError::MissingField("name"))?;

    Ok(WsGateConfig {
        name,
        prefix: raw.prefix.unwrap_or_else(|| "wsgate".to_owned()),
        httpserver_host: raw.httpserver_host.unwrap_or_else(|| "0.0.0.0".to_owned()),
        httpserver_port: raw.httpserver_port.unwrap_or(8080),
        httpserver_max_queued: raw.httpserver_max_queued.unwrap_or(128),
        httpserver_max_threads: raw.httpserver_max_threads.unwrap_or(4).max(1),
        httpserver_cors_allow: raw.httpserver_cors_allow.unwrap_or_else(|| "*".to_owned()),
        ws_max: raw.ws_max.unwrap_or(64).max(1),
        ws_heartbeat_time: Duration::from_millis(clamp_nonneg(raw.ws_heartbeat_time, 3000)),
        ws_send_time: Duration::from_millis(clamp_nonneg(raw.ws_send_time, 250)),
        ws_max_send: raw.ws_max_send.unwrap_or(10).max(1),
        filter: FilterConfig {
            field: raw.filter_field,
            value: raw.filter_value,
        },
        heartbeat_id: raw.heartbeat_id,
        heartbeat_max: raw.heartbeat_max.unwrap_or(10),
        heartbeat_time: Duration::from_millis(clamp_nonneg(raw.heartbeat_time, 3000)),
        sm_ready_timeout: TimeoutSpec::from_millis_field(raw.sm_ready_timeout, 15_000),
        activate_timeout: TimeoutSpec::from_millis_field(raw.activate_timeout, 20_000),
        session_timeout: TimeoutSpec::from_millis_field(raw.sess_timeout, 60_000),
        sensors: raw.sensors.unwrap_or_default(),
    })
}

fn clamp_nonneg(raw: Option<i64>, default_ms: u64) -> u64 {
    match raw {
        None | Some(0) => default_ms,
        Some(n) if n < 0 => default_ms,
        Some(n) => n as u64,
    }
}
