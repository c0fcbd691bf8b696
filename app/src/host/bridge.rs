use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{CONTROLLER_ADDRESS, CommandArgs, HostLogLevel, HostPort, PollKind, keys};
use crate::command::{CommandTable, Dispatcher};
use crate::core::{BridgeContext, BridgeError, DeviceAddress, DeviceState, DriverKind};
use crate::device::{DeviceRecord, DeviceRegistry, Discovery, DiscoveryReport};
use crate::driver::{ConnectionSettings, DriverAdapter};

const CONTROLLER_COMMANDS: [&str; 2] = ["discover", "set_log_level"];

/// Entry points the hub drives: startup, configuration changes, polls and commands.
pub struct Bridge {
    context: BridgeContext,
    table: Arc<CommandTable>,
    registry: Arc<DeviceRegistry>,
    discovery: Discovery,
    dispatcher: Dispatcher,
    host: Arc<dyn HostPort>,
    //held for the whole discovery run, so runs never overlap
    connections: tokio::sync::Mutex<ConnectionSettings>,
    unavailable: Mutex<BTreeSet<DriverKind>>,
    //registry records the hub has accepted; the rest are offered again on every discovery run
    hub_registered: Mutex<BTreeSet<DeviceAddress>>,
    heartbeat: AtomicBool,
    log_level: AtomicU8,
}

impl Bridge {
    pub fn new(
        context: BridgeContext,
        table: Arc<CommandTable>,
        adapters: Vec<Arc<dyn DriverAdapter>>,
        host: Arc<dyn HostPort>,
        connections: ConnectionSettings,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new());

        Self {
            discovery: Discovery::new(table.clone(), registry.clone(), adapters),
            dispatcher: Dispatcher::new(table.clone(), registry.clone()),
            context,
            table,
            registry,
            host,
            connections: tokio::sync::Mutex::new(connections),
            unavailable: Mutex::new(BTreeSet::new()),
            hub_registered: Mutex::new(BTreeSet::new()),
            heartbeat: AtomicBool::new(false),
            log_level: AtomicU8::new(HostLogLevel::DEFAULT.value()),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[tracing::instrument(skip(self))]
    pub async fn on_start(&self) -> anyhow::Result<()> {
        tracing::info!("Starting {} {}", self.context.name, self.context.version);

        let capabilities: Vec<String> = CONTROLLER_COMMANDS.iter().map(|c| c.to_string()).collect();
        self.host
            .register_device(CONTROLLER_ADDRESS, &self.context.name, &capabilities)
            .await?;

        self.report(CONTROLLER_ADDRESS, keys::STATUS, "1").await;
        self.report(
            CONTROLLER_ADDRESS,
            keys::LOG_LEVEL,
            &self.log_level.load(Ordering::Relaxed).to_string(),
        )
        .await;
        self.toggle_heartbeat().await;

        self.run_discovery().await;
        self.report_device_states().await;

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub async fn on_config_changed(&self, params: &HashMap<String, String>) -> DiscoveryReport {
        if let Some(level) = params.get("log_level") {
            self.set_log_level(level).await;
        }

        self.connections.lock().await.apply_params(params);
        self.run_discovery().await
    }

    pub async fn on_poll_tick(&self, kind: PollKind) {
        match kind {
            PollKind::Short => self.report_device_states().await,
            PollKind::Long => {
                self.toggle_heartbeat().await;

                let retry = !self
                    .unavailable
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_empty();
                if retry {
                    tracing::info!("Some drivers are unavailable, retrying discovery");
                    self.run_discovery().await;
                }
            }
        }
    }

    #[tracing::instrument(skip(self, args))]
    pub async fn on_command(&self, address: &str, command: &str, args: &CommandArgs) -> Result<(), BridgeError> {
        if address == CONTROLLER_ADDRESS {
            return self.on_controller_command(command, args).await;
        }

        let address = DeviceAddress::parse(address).ok_or_else(|| BridgeError::UnknownDevice(address.to_string()))?;
        let result = self.dispatcher.dispatch_named(&address, command).await;

        if matches!(result, Ok(_) | Err(BridgeError::Transport { .. })) {
            if let Some(state) = self.registry.state(&address) {
                self.report_device_state(&address, state).await;
            }
        }

        result.map(|_| ())
    }

    pub async fn stop(&self) {
        tracing::info!("Stopping {}", self.context.name);
        self.report(CONTROLLER_ADDRESS, keys::STATUS, "0").await;
        self.report(CONTROLLER_ADDRESS, keys::RF_CONNECTED, "0").await;
    }

    async fn on_controller_command(&self, command: &str, args: &CommandArgs) -> Result<(), BridgeError> {
        match command.trim().to_ascii_lowercase().as_str() {
            "discover" | "connectbl" => {
                self.run_discovery().await;
                Ok(())
            }
            "set_log_level" | "set_dm" => {
                let level = args.get("value").map(String::as_str).unwrap_or("0");
                self.set_log_level(level).await;
                Ok(())
            }
            _ => Err(BridgeError::unknown_command(CONTROLLER_ADDRESS, command)),
        }
    }

    async fn toggle_heartbeat(&self) {
        let was_on = self.heartbeat.fetch_xor(true, Ordering::Relaxed);
        self.report(CONTROLLER_ADDRESS, keys::HEARTBEAT, if was_on { "DOF" } else { "DON" })
            .await;
    }

    async fn set_log_level(&self, value: &str) {
        let Some(level) = HostLogLevel::parse(value) else {
            tracing::warn!("Ignoring unknown log level {:?}", value);
            return;
        };

        if let Some(control) = &self.context.log_control {
            if let Err(e) = control.set_level(level.filter()) {
                tracing::error!("Error changing log level: {:?}", e);
                return;
            }
        }

        self.log_level.store(level.value(), Ordering::Relaxed);
        self.report(CONTROLLER_ADDRESS, keys::LOG_LEVEL, &level.value().to_string())
            .await;
    }

    async fn run_discovery(&self) -> DiscoveryReport {
        //kept until the hub registrations are done, so two runs never offer the same device
        let connections = self.connections.lock().await;
        let report = self.discovery.run(&connections).await;

        *self.unavailable.lock().unwrap_or_else(PoisonError::into_inner) =
            report.unavailable.iter().map(|(kind, _)| *kind).collect();

        self.register_pending_devices().await;
        drop(connections);

        let flag = |kind: DriverKind| if report.is_connected(kind) { "1" } else { "0" };
        self.report(CONTROLLER_ADDRESS, keys::RF_CONNECTED, flag(DriverKind::RfBlaster))
            .await;
        self.report(CONTROLLER_ADDRESS, keys::CLOUD_CONNECTED, flag(DriverKind::CloudCurtain))
            .await;
        self.report(CONTROLLER_ADDRESS, keys::DEVICE_COUNT, &self.registry.len().to_string())
            .await;

        report
    }

    async fn register_pending_devices(&self) {
        let pending: Vec<DeviceRecord> = {
            let hub_registered = self.hub_registered.lock().unwrap_or_else(PoisonError::into_inner);
            self.registry
                .records()
                .into_iter()
                .filter(|record| !hub_registered.contains(&record.address))
                .collect()
        };

        for record in pending {
            let capabilities: Vec<String> = self
                .table
                .get(&record.logical_name)
                .map(|entry| entry.roles().map(|role| role.to_string()).collect())
                .unwrap_or_default();

            if let Err(e) = self
                .host
                .register_device(record.address.as_str(), &record.logical_name, &capabilities)
                .await
            {
                tracing::error!(
                    "Error registering {} with the hub, retrying on next discovery: {:?}",
                    record.logical_name,
                    e
                );
                continue;
            }

            self.hub_registered
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(record.address.clone());
            self.report_device_state(&record.address, record.last_state).await;
        }
    }

    async fn report_device_states(&self) {
        for record in self.registry.records() {
            self.report_device_state(&record.address, record.last_state).await;
        }
    }

    async fn report_device_state(&self, address: &DeviceAddress, state: DeviceState) {
        self.report(address.as_str(), keys::STATUS, &state.status_value().to_string())
            .await;
    }

    async fn report(&self, address: &str, key: &str, value: &str) {
        if let Err(e) = self.host.report_state(address, key, value).await {
            tracing::error!("Error reporting {}/{} to the hub: {:?}", address, key, e);
        }
    }
}
