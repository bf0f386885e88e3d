// ABOUTME: Environment variable overrides for the configuration.
// ABOUTME: Parses durations, booleans and names from named variables.

use super::Config;
use crate::error::{Error, Result};
use crate::types::{AppName, ServiceName};
use std::path::PathBuf;
use std::time::Duration;

/// Every variable read by [`Config::apply_env`].
pub const ENV_VARS: &[&str] = &[
    "APP_NAME",
    "SERVICE_NAME",
    "TRAFFIC_LABEL",
    "TRAFFIC_LABEL_VALUE",
    "PRIORITY_LABEL",
    "HEALTH_URL",
    "HEALTH_CMD",
    "HEALTH_TIMEOUT",
    "HEALTH_INTERVAL",
    "HEALTH_ATTEMPT_TIMEOUT",
    "SKIP_HEALTH",
    "AUTO_CONFIRM",
    "COMPOSE_FILE",
    "CONTAINER_RUNTIME",
    "CONTAINER_SOCKET",
    "PULL_POLICY",
    "COMPOSE_TIMEOUT",
];

/// Parse `1/0`, `true/false`, `yes/no`, `on/off` (case-insensitive).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse bare integer seconds (`60`) or a humantime duration (`90s`, `2m`).
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime_serde::re::humantime::parse_duration(value).ok()
}

fn invalid(var: &str, value: &str, expected: &str) -> Error {
    Error::InvalidConfig(format!("{var}={value:?}: expected {expected}"))
}

impl Config {
    /// Overlay values from `lookup` (normally the process environment).
    /// Unset and empty variables leave the current value alone.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let duration = |key: &str| -> Result<Option<Duration>> {
            match get(key) {
                Some(v) => parse_duration(&v)
                    .map(Some)
                    .ok_or_else(|| invalid(key, &v, "seconds or a duration like 90s")),
                None => Ok(None),
            }
        };
        let boolean = |key: &str| -> Result<Option<bool>> {
            match get(key) {
                Some(v) => parse_bool(&v)
                    .map(Some)
                    .ok_or_else(|| invalid(key, &v, "true or false")),
                None => Ok(None),
            }
        };

        if let Some(v) = get("APP_NAME") {
            self.app = AppName::new(v.trim())
                .map_err(|e| Error::InvalidConfig(format!("APP_NAME: {e}")))?;
        }
        if let Some(v) = get("SERVICE_NAME") {
            self.service = ServiceName::new(v.trim())
                .map_err(|e| Error::InvalidConfig(format!("SERVICE_NAME: {e}")))?;
        }
        if let Some(v) = get("TRAFFIC_LABEL") {
            self.traffic_label = v;
        }
        if let Some(v) = get("TRAFFIC_LABEL_VALUE") {
            self.traffic_value = v;
        }
        if let Some(v) = get("PRIORITY_LABEL") {
            self.priority_label = Some(v);
        }
        if let Some(v) = get("HEALTH_URL") {
            self.health_url = v;
        }
        if let Some(v) = get("HEALTH_CMD") {
            self.health_cmd = Some(v);
        }
        if let Some(d) = duration("HEALTH_TIMEOUT")? {
            self.health_timeout = d;
        }
        if let Some(d) = duration("HEALTH_INTERVAL")? {
            self.health_interval = d;
        }
        if let Some(d) = duration("HEALTH_ATTEMPT_TIMEOUT")? {
            self.health_attempt_timeout = d;
        }
        if let Some(b) = boolean("SKIP_HEALTH")? {
            self.skip_health = b;
        }
        if let Some(b) = boolean("AUTO_CONFIRM")? {
            self.auto_confirm = b;
        }
        if let Some(v) = get("COMPOSE_FILE") {
            self.compose_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("CONTAINER_RUNTIME") {
            self.runtime = Some(v.parse().map_err(Error::InvalidConfig)?);
        }
        if let Some(v) = get("CONTAINER_SOCKET") {
            self.socket = Some(v);
        }
        if let Some(v) = get("PULL_POLICY") {
            self.pull_policy = v;
        }
        if let Some(d) = duration("COMPOSE_TIMEOUT")? {
            self.compose_timeout = d;
        }

        self.validate()
    }
}
