use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use infrastructure::{MonitoringConfig, MqttConfig};
use serde::Deserialize;

use crate::driver::ConnectionSettings;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub monitoring: MonitoringConfig,
    pub mqtt: MqttConfig,
    pub hub: HubSettings,
    pub command_table: CommandTableSettings,
    pub rf_blaster: RfBlasterSettings,
    #[serde(default)]
    pub cloud_curtain: CloudCurtainSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_builder(Config::builder().add_source(File::with_name("config.toml")))
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self, ConfigError> {
        let builder = builder.add_source(
            Environment::with_prefix("MULTIPASS")
                .prefix_separator("_")
                .separator("__")
                .list_separator(","),
        );

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Initial connection parameters; the hub may override them at runtime.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            rf_device: self.rf_blaster.device.clone(),
            cloud_url: self.cloud_curtain.url.clone(),
            cloud_token: self.cloud_curtain.token.clone(),
            timeout: Duration::from_secs(self.session.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HubSettings {
    pub base_topic: String,
    #[serde(default = "default_name")]
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CommandTableSettings {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RfBlasterSettings {
    pub base_topic: String,
    pub device: Option<String>,
    #[serde(default = "default_rf_command")]
    pub command: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CloudCurtainSettings {
    pub url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionSettings {
    pub timeout_secs: u64,
    pub max_age_secs: u64,
}

impl SessionSettings {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_age_secs: 1800,
        }
    }
}

fn default_name() -> String {
    "MultiPass".to_string()
}

fn default_rf_command() -> String {
    "RfRaw".to_string()
}
