// ABOUTME: Configuration types and loading for bluegreen.
// ABOUTME: Layers built-in defaults, an optional YAML file, and environment variables.

mod deserialize;
mod env;

pub use env::{ENV_VARS, parse_bool, parse_duration};

use crate::error::{Error, Result};
use crate::runtime::{DEFAULT_COMPOSE_TIMEOUT, DEFAULT_PULL_POLICY, RuntimeConfig};
use crate::types::{AppName, ServiceName};
use deserialize::{deserialize_app_name, deserialize_service_name};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "bluegreen.yml";
pub const CONFIG_FILENAME_ALT: &str = "bluegreen.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".bluegreen/config.yml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_app", deserialize_with = "deserialize_app_name")]
    pub app: AppName,

    /// Service inside each stack that is health-probed.
    #[serde(
        default = "default_service",
        deserialize_with = "deserialize_service_name"
    )]
    pub service: ServiceName,

    /// Router label that marks a stack as traffic-enabled.
    #[serde(default = "default_traffic_label")]
    pub traffic_label: String,

    /// Value of `traffic_label` meaning "enabled".
    #[serde(default = "default_traffic_value")]
    pub traffic_value: String,

    /// Router priority label; defaults to the Traefik router priority for `app`.
    #[serde(default)]
    pub priority_label: Option<String>,

    #[serde(default = "default_health_url")]
    pub health_url: String,

    /// Shell command run inside the service container; derived from
    /// `health_url` when unset.
    #[serde(default)]
    pub health_cmd: Option<String>,

    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub health_timeout: Duration,

    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub health_interval: Duration,

    #[serde(default = "default_attempt_timeout", with = "humantime_serde")]
    pub health_attempt_timeout: Duration,

    #[serde(default)]
    pub skip_health: bool,

    /// Promote without asking once the new color is healthy.
    #[serde(default = "default_true")]
    pub auto_confirm: bool,

    #[serde(default)]
    pub compose_file: Option<PathBuf>,

    #[serde(default)]
    pub runtime: Option<crate::runtime::RuntimeType>,

    #[serde(default)]
    pub socket: Option<String>,

    #[serde(default = "default_pull_policy")]
    pub pull_policy: String,

    #[serde(default = "default_compose_timeout", with = "humantime_serde")]
    pub compose_timeout: Duration,
}

fn default_app() -> AppName {
    AppName::default()
}

fn default_service() -> ServiceName {
    ServiceName::default()
}

fn default_traffic_label() -> String {
    "traefik.enable".to_string()
}

fn default_traffic_value() -> String {
    "true".to_string()
}

fn default_health_url() -> String {
    "http://localhost:8080/health".to_string()
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_health_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

fn default_pull_policy() -> String {
    DEFAULT_PULL_POLICY.to_string()
}

fn default_compose_timeout() -> Duration {
    DEFAULT_COMPOSE_TIMEOUT
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: default_app(),
            service: default_service(),
            traffic_label: default_traffic_label(),
            traffic_value: default_traffic_value(),
            priority_label: None,
            health_url: default_health_url(),
            health_cmd: None,
            health_timeout: default_health_timeout(),
            health_interval: default_health_interval(),
            health_attempt_timeout: default_attempt_timeout(),
            skip_health: false,
            auto_confirm: true,
            compose_file: None,
            runtime: None,
            socket: None,
            pull_policy: default_pull_policy(),
            compose_timeout: default_compose_timeout(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml).map_err(Error::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find a config file in `dir`. Returns defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading config from {}", path.display());
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Load the full layered configuration: an explicit file (which must
    /// exist) or a discovered one, then environment variable overrides.
    pub fn resolve(dir: &Path, explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) if !path.exists() => {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            Some(path) => Self::load(path)?,
            None => Self::discover(dir)?,
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Reject combinations that would make the health gate meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.health_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "health_interval must be greater than zero".to_string(),
            ));
        }
        if self.health_attempt_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "health_attempt_timeout must be greater than zero".to_string(),
            ));
        }
        if self.traffic_label.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "traffic_label cannot be empty".to_string(),
            ));
        }
        if self.traffic_value == "false" {
            return Err(Error::InvalidConfig(
                "traffic_value cannot be \"false\": that value marks disabled stacks".to_string(),
            ));
        }
        Ok(())
    }

    pub fn priority_label(&self) -> String {
        self.priority_label
            .clone()
            .unwrap_or_else(|| format!("traefik.http.routers.{}.priority", self.app))
    }

    /// Health probe command, run inside the service container.
    pub fn health_command(&self) -> Vec<String> {
        let script = match &self.health_cmd {
            Some(cmd) => cmd.clone(),
            None => {
                let url = shell_quote(&self.health_url);
                format!("wget -q --spider {url} || curl -fsS -o /dev/null {url}")
            }
        };
        vec!["sh".to_string(), "-c".to_string(), script]
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            runtime: self.runtime,
            socket: self.socket.clone(),
        }
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
