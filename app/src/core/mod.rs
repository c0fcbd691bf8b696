mod address;
mod context;
mod error;
mod role;

pub use address::DeviceAddress;
pub use context::BridgeContext;
pub use error::BridgeError;
pub use role::{CommandRole, Payload};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum DriverKind {
    #[display("RF blaster")]
    RfBlaster,
    #[display("cloud curtain")]
    CloudCurtain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::Display)]
pub enum DeviceState {
    #[default]
    Unknown,
    Idle,
    Active,
    Unreachable,
}

impl DeviceState {
    //Numeric status value as shown on the hub
    pub fn status_value(self) -> u8 {
        match self {
            DeviceState::Unknown => 0,
            DeviceState::Idle => 1,
            DeviceState::Active => 2,
            DeviceState::Unreachable => 3,
        }
    }
}
