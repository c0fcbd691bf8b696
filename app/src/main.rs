use std::sync::Arc;

use anyhow::Context as _;
use settings::Settings;

use crate::command::CommandTable;
use crate::core::{BridgeContext, DriverKind};
use crate::driver::{CloudCurtainClient, DriverAdapter, SessionAdapter, TasmotaRfBridge};
use crate::host::Bridge;
use crate::host::mqtt::{MqttHost, process_host_messages};

mod command;
mod core;
mod device;
mod driver;
mod host;
mod settings;

#[cfg(test)]
mod tests;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() -> anyhow::Result<()> {
    let settings = Settings::new().context("Error reading configuration")?;
    let log_control = settings.monitoring.init().context("Error initializing monitoring")?;

    let table = Arc::new(CommandTable::load(&settings.command_table.path)?);

    let mut mqtt = settings.mqtt.new_client();

    let rf_transport = TasmotaRfBridge::new(&mut mqtt, &settings.rf_blaster.base_topic, &settings.rf_blaster.command)
        .await
        .context("Error initializing RF blaster")?;

    let adapters: Vec<Arc<dyn DriverAdapter>> = vec![
        Arc::new(SessionAdapter::new(
            DriverKind::RfBlaster,
            rf_transport,
            settings.session.max_age(),
        )),
        Arc::new(SessionAdapter::new(
            DriverKind::CloudCurtain,
            CloudCurtainClient::new(),
            settings.session.max_age(),
        )),
    ];

    let host = Arc::new(MqttHost::new(&settings.hub.base_topic, mqtt.sender()));
    let host_rx = mqtt
        .subscribe_all(&host.subscription_topics())
        .await
        .context("Error subscribing to hub topics")?;

    let bridge = Arc::new(Bridge::new(
        BridgeContext::new(&settings.hub.name, Some(log_control)),
        table,
        adapters,
        host.clone(),
        settings.connection_settings(),
    ));

    tracing::info!("Starting MQTT processing");
    let mqtt_exec = tokio::spawn(mqtt.run());

    bridge.on_start().await.context("Error registering with the hub")?;

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = mqtt_exec => tracing::error!("MQTT processing stopped"),
        _ = process_host_messages(bridge.clone(), host, host_rx) => {},
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown requested"),
    );

    bridge.stop().await;

    Ok(())
}
