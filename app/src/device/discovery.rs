use std::collections::BTreeMap;
use std::sync::Arc;

use super::{DeviceRecord, DeviceRegistry};
use crate::command::CommandTable;
use crate::core::{DeviceState, DriverKind};
use crate::driver::{ConnectionSettings, DriverAdapter};

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub registered: Vec<DeviceRecord>,
    pub connected: Vec<DriverKind>,
    /// Kinds that should connect but did not. Worth retrying.
    pub unavailable: Vec<(DriverKind, String)>,
    /// Kinds without an endpoint. Retrying only helps after a config change.
    pub unconfigured: Vec<DriverKind>,
}

impl DiscoveryReport {
    pub fn is_connected(&self, kind: DriverKind) -> bool {
        self.connected.contains(&kind)
    }
}

/// Registers every command table entry whose driver can be connected.
pub struct Discovery {
    table: Arc<CommandTable>,
    registry: Arc<DeviceRegistry>,
    adapters: BTreeMap<DriverKind, Arc<dyn DriverAdapter>>,
}

impl Discovery {
    pub fn new(
        table: Arc<CommandTable>,
        registry: Arc<DeviceRegistry>,
        adapters: impl IntoIterator<Item = Arc<dyn DriverAdapter>>,
    ) -> Self {
        Self {
            table,
            registry,
            adapters: adapters.into_iter().map(|adapter| (adapter.kind(), adapter)).collect(),
        }
    }

    /// Safe to repeat: devices already registered are left untouched. Connection failures
    /// only skip the devices of the affected driver kind.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self, settings: &ConnectionSettings) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for kind in self.table.driver_kinds() {
            let Some(adapter) = self.adapters.get(&kind) else {
                tracing::error!("No driver available for {} devices", kind);
                report.unavailable.push((kind, "no driver available".to_string()));
                continue;
            };

            let Some(endpoint) = settings.endpoint(kind) else {
                tracing::warn!("No endpoint configured for {}, skipping its devices", kind);
                report.unconfigured.push(kind);
                continue;
            };

            if let Err(e) = adapter.connect(endpoint).await {
                tracing::warn!("Skipping {} devices: {}", kind, e);
                report.unavailable.push((kind, e.to_string()));
                continue;
            }
            report.connected.push(kind);

            for entry in self.table.entries_of(kind) {
                let record = DeviceRecord {
                    address: entry.address().clone(),
                    logical_name: entry.logical_name().to_string(),
                    driver_kind: kind,
                    driver: adapter.clone(),
                    last_state: DeviceState::Idle,
                };

                if self.registry.register(record.clone()) {
                    tracing::info!("Registered {} as {} ({})", record.logical_name, record.address, kind);
                    report.registered.push(record);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::DeviceAddress;
    use crate::driver::SessionAdapter;
    use crate::tests::{FakeTransport, mixed_table};

    struct Fixture {
        rf: FakeTransport,
        cloud: FakeTransport,
        registry: Arc<DeviceRegistry>,
        discovery: Discovery,
    }

    fn fixture() -> Fixture {
        let rf = FakeTransport::accepting();
        let cloud = FakeTransport::accepting();
        let registry = Arc::new(DeviceRegistry::new());

        let adapters: Vec<Arc<dyn DriverAdapter>> = vec![
            Arc::new(SessionAdapter::new(DriverKind::RfBlaster, rf.clone(), Duration::from_secs(600))),
            Arc::new(SessionAdapter::new(DriverKind::CloudCurtain, cloud.clone(), Duration::from_secs(600))),
        ];

        let discovery = Discovery::new(Arc::new(mixed_table()), registry.clone(), adapters);

        Fixture {
            rf,
            cloud,
            registry,
            discovery,
        }
    }

    fn settings() -> ConnectionSettings {
        ConnectionSettings {
            rf_device: Some("rfbridge".to_string()),
            cloud_url: Some("https://curtains.example.com".to_string()),
            cloud_token: Some("secret".to_string()),
            timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn registers_all_devices_when_connected() {
        let fixture = fixture();

        let report = fixture.discovery.run(&settings()).await;

        assert_eq!(report.registered.len(), 3);
        assert!(report.is_connected(DriverKind::RfBlaster));
        assert!(report.is_connected(DriverKind::CloudCurtain));
        assert_eq!(
            fixture.registry.state(&DeviceAddress::derive("Office")),
            Some(DeviceState::Idle)
        );
    }

    #[tokio::test]
    async fn failed_driver_only_skips_its_devices() {
        let fixture = fixture();
        fixture.cloud.set_accept_auth(false);

        let report = fixture.discovery.run(&settings()).await;

        assert_eq!(report.registered.len(), 2);
        assert_eq!(report.unavailable.len(), 1);
        assert_eq!(report.unavailable[0].0, DriverKind::CloudCurtain);
        assert!(!fixture.registry.contains(&DeviceAddress::derive("Living Room")));
    }

    #[tokio::test]
    async fn missing_endpoint_skips_driver() {
        let fixture = fixture();
        let mut settings = settings();
        settings.rf_device = None;

        let report = fixture.discovery.run(&settings).await;

        assert_eq!(report.registered.len(), 1);
        assert_eq!(fixture.rf.auth_attempts(), 0);
        assert_eq!(report.unconfigured, vec![DriverKind::RfBlaster]);
        assert!(report.unavailable.is_empty());
    }

    #[tokio::test]
    async fn repeated_discovery_is_idempotent() {
        let fixture = fixture();

        fixture.discovery.run(&settings()).await;
        fixture
            .registry
            .update_state(&DeviceAddress::derive("Office"), DeviceState::Active)
            .unwrap();
        let second = fixture.discovery.run(&settings()).await;

        assert!(second.registered.is_empty());
        assert_eq!(fixture.registry.len(), 3);
        assert_eq!(
            fixture.registry.state(&DeviceAddress::derive("Office")),
            Some(DeviceState::Active)
        );
    }

    #[tokio::test]
    async fn recovered_driver_registers_remaining_devices() {
        let fixture = fixture();
        fixture.cloud.set_accept_auth(false);
        fixture.discovery.run(&settings()).await;

        fixture.cloud.set_accept_auth(true);
        let report = fixture.discovery.run(&settings()).await;

        assert_eq!(report.registered.len(), 1);
        assert_eq!(report.registered[0].logical_name, "Living Room");
        assert_eq!(fixture.registry.len(), 3);
    }
}
