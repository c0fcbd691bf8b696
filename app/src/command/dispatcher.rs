use std::sync::Arc;

use super::CommandTable;
use crate::core::{BridgeError, CommandRole, DeviceAddress, DeviceState};
use crate::device::{DeviceRecord, DeviceRegistry};

/// Resolves device and payload and hands the payload to the device's driver.
pub struct Dispatcher {
    table: Arc<CommandTable>,
    registry: Arc<DeviceRegistry>,
}

impl Dispatcher {
    pub fn new(table: Arc<CommandTable>, registry: Arc<DeviceRegistry>) -> Self {
        Self { table, registry }
    }

    #[tracing::instrument(skip(self))]
    pub async fn dispatch(&self, address: &DeviceAddress, role: CommandRole) -> Result<DeviceState, BridgeError> {
        let device = self.registry.get(address)?;
        self.send(&device, role).await
    }

    /// Like [`Dispatcher::dispatch`] with a command name as sent by the hub. An unknown
    /// device is reported before an unknown command.
    #[tracing::instrument(skip(self))]
    pub async fn dispatch_named(&self, address: &DeviceAddress, command: &str) -> Result<DeviceState, BridgeError> {
        let device = self.registry.get(address)?;
        let role = CommandRole::from_name(command).ok_or_else(|| BridgeError::unknown_command(address, command))?;

        self.send(&device, role).await
    }

    async fn send(&self, device: &DeviceRecord, role: CommandRole) -> Result<DeviceState, BridgeError> {
        let entry = self
            .table
            .get(&device.logical_name)
            .ok_or_else(|| BridgeError::UnknownDevice(device.address.to_string()))?;

        let payload = entry
            .payload(role)
            .ok_or_else(|| BridgeError::unknown_command(&device.address, role))?;

        match device.driver.send_command(payload, entry.target()).await {
            Ok(()) => {
                tracing::info!("Sent {} to {}", role, device.logical_name);
                self.registry.update_state(&device.address, DeviceState::Active)?;
                Ok(DeviceState::Active)
            }
            Err(e) => {
                tracing::warn!("Sending {} to {} failed: {}", role, device.logical_name, e);
                if matches!(e, BridgeError::Transport { .. }) {
                    self.registry.update_state(&device.address, DeviceState::Unreachable)?;
                }
                Err(e)
            }
        }
    }
}
