mod bridge;
pub mod mqtt;

pub use bridge::Bridge;

use std::collections::HashMap;

use tracing::level_filters::LevelFilter;

pub const CONTROLLER_ADDRESS: &str = "controller";

/// Keys under which values are reported to the hub.
pub mod keys {
    pub const STATUS: &str = "ST";
    pub const RF_CONNECTED: &str = "GV0";
    pub const DEVICE_COUNT: &str = "GV1";
    pub const CLOUD_CONNECTED: &str = "GV2";
    pub const LOG_LEVEL: &str = "GV3";
    pub const HEARTBEAT: &str = "heartbeat";
}

pub type CommandArgs = HashMap<String, String>;

/// Operations the bridge calls on the home-automation hub.
#[async_trait::async_trait]
pub trait HostPort: Send + Sync {
    async fn register_device(&self, address: &str, display_name: &str, capabilities: &[String]) -> anyhow::Result<()>;

    async fn report_state(&self, address: &str, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Short,
    Long,
}

impl PollKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "short" => Some(PollKind::Short),
            "long" => Some(PollKind::Long),
            _ => None,
        }
    }
}

/// Numeric hub log level (10 debug, 20 info, 30 warning, 40 error, 50 critical).
/// 0 means not set and maps to warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostLogLevel(u8);

impl HostLogLevel {
    pub const DEFAULT: HostLogLevel = HostLogLevel(30);

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().parse::<u8>().ok()? {
            0 => Some(Self::DEFAULT),
            level @ (10 | 20 | 30 | 40 | 50) => Some(Self(level)),
            _ => None,
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn filter(self) -> LevelFilter {
        match self.0 {
            0..=10 => LevelFilter::DEBUG,
            11..=20 => LevelFilter::INFO,
            21..=30 => LevelFilter::WARN,
            _ => LevelFilter::ERROR,
        }
    }
}
