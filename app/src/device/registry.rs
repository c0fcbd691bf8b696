use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::DeviceRecord;
use crate::core::{BridgeError, DeviceAddress, DeviceState};

struct RegisteredDevice {
    record: DeviceRecord,
    state: Mutex<DeviceState>,
}

impl RegisteredDevice {
    fn state(&self) -> DeviceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> DeviceRecord {
        DeviceRecord {
            last_state: self.state(),
            ..self.record.clone()
        }
    }
}

/// Addition-only set of provisioned devices, keyed by address.
///
/// The map lock is only held for lookups and inserts. State updates lock the single
/// device, so commands to one device never block lookups of another.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<BTreeMap<DeviceAddress, Arc<RegisteredDevice>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` and leaves the registry untouched when the address is taken.
    pub fn register(&self, record: DeviceRecord) -> bool {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);

        match devices.entry(record.address.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(RegisteredDevice {
                    state: Mutex::new(record.last_state),
                    record,
                }));
                true
            }
        }
    }

    pub fn get(&self, address: &DeviceAddress) -> Result<DeviceRecord, BridgeError> {
        self.device(address).map(|device| device.snapshot())
    }

    pub fn update_state(&self, address: &DeviceAddress, state: DeviceState) -> Result<(), BridgeError> {
        let device = self.device(address)?;
        let mut current = device.state.lock().unwrap_or_else(PoisonError::into_inner);

        if *current != state {
            tracing::debug!("Device {} changed state {} -> {}", address, *current, state);
        }
        *current = state;

        Ok(())
    }

    pub fn state(&self, address: &DeviceAddress) -> Option<DeviceState> {
        self.device(address).ok().map(|device| device.state())
    }

    pub fn contains(&self, address: &DeviceAddress) -> bool {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(address)
    }

    /// Snapshots in address order.
    pub fn records(&self) -> Vec<DeviceRecord> {
        let devices: Vec<Arc<RegisteredDevice>> = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        devices.iter().map(|device| device.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn device(&self, address: &DeviceAddress) -> Result<Arc<RegisteredDevice>, BridgeError> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownDevice(address.to_string()))
    }
}
