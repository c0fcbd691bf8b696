mod discovery;
mod registry;

pub use discovery::{Discovery, DiscoveryReport};
pub use registry::DeviceRegistry;

use std::fmt::Debug;
use std::sync::Arc;

use crate::core::{DeviceAddress, DeviceState, DriverKind};
use crate::driver::DriverAdapter;

/// A provisioned device. Snapshots handed out by the registry carry the state at the time
/// of the lookup.
#[derive(Clone)]
pub struct DeviceRecord {
    pub address: DeviceAddress,
    pub logical_name: String,
    pub driver_kind: DriverKind,
    pub driver: Arc<dyn DriverAdapter>,
    pub last_state: DeviceState,
}

impl Debug for DeviceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("address", &self.address)
            .field("logical_name", &self.logical_name)
            .field("driver_kind", &self.driver_kind)
            .field("last_state", &self.last_state)
            .finish()
    }
}
