use infrastructure::{Mqtt, MqttSender, MqttSubscription};

use super::{DeviceTransport, Endpoint};
use crate::core::Payload;

/// RF blaster reached through a Tasmota-flashed RF bridge over MQTT.
///
/// The endpoint host is the Tasmota device topic. Authentication asks the bridge for its
/// status and waits for the answer, commands replay the captured code as uppercase hex.
pub struct TasmotaRfBridge {
    base_topic: String,
    command: String,
    sender: MqttSender,
    status_rx: MqttSubscription,
}

impl TasmotaRfBridge {
    pub async fn new(mqtt: &mut Mqtt, base_topic: &str, command: &str) -> anyhow::Result<Self> {
        let base_topic = base_topic.trim_matches('/').to_string();
        let status_rx = mqtt.subscribe(format!("{}/stat/+/STATUS", base_topic)).await?;

        Ok(Self {
            base_topic,
            command: command.to_string(),
            sender: mqtt.sender(),
            status_rx,
        })
    }
}

fn command_topic(base_topic: &str, device: &str, command: &str) -> String {
    format!("{}/cmnd/{}/{}", base_topic, device, command)
}

fn status_topic(base_topic: &str, device: &str) -> String {
    format!("{}/stat/{}/STATUS", base_topic, device)
}

fn raw_code(payload: &Payload) -> String {
    payload.to_hex().to_uppercase()
}

#[async_trait::async_trait]
impl DeviceTransport for TasmotaRfBridge {
    async fn authenticate(&mut self, endpoint: &Endpoint) -> anyhow::Result<bool> {
        let expected = status_topic(&self.base_topic, &endpoint.host);

        let stale = self.status_rx.drain();
        if stale > 0 {
            tracing::debug!("Dropped {} stale status messages", stale);
        }

        self.sender
            .send_transient(command_topic(&self.base_topic, &endpoint.host, "Status"), "")
            .await?;

        while let Some(msg) = self.status_rx.recv().await {
            if msg.topic == expected {
                tracing::debug!("RF bridge {} answered status request", endpoint.host);
                return Ok(true);
            }
        }

        anyhow::bail!("status subscription closed")
    }

    async fn send(&mut self, endpoint: &Endpoint, payload: &Payload, target: &str) -> anyhow::Result<()> {
        tracing::debug!("Replaying {} byte RF code for {} via {}", payload.len(), target, endpoint.host);

        self.sender
            .send_transient(command_topic(&self.base_topic, &endpoint.host, &self.command), raw_code(payload))
            .await
    }
}
