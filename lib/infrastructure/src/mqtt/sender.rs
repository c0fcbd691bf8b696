use std::sync::Arc;

use anyhow::Context as _;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::AsyncClient;
use serde::Serialize;

/// Cheap to clone; all clones publish through the same connection.
#[derive(Clone)]
pub struct MqttSender {
    client: Arc<AsyncClient>,
}

impl MqttSender {
    pub(super) fn new(client: Arc<AsyncClient>) -> Self {
        Self { client }
    }

    /// Kept by the broker and replayed to late subscribers.
    pub async fn send_retained(&self, topic: impl Into<String>, payload: impl Into<String>) -> anyhow::Result<()> {
        self.publish(topic.into(), payload.into(), true).await
    }

    pub async fn send_retained_json<T: Serialize>(&self, topic: impl Into<String>, payload: &T) -> anyhow::Result<()> {
        let topic = topic.into();
        let json = serde_json::to_string(payload).with_context(|| format!("Error serializing payload for {}", topic))?;

        self.publish(topic, json, true).await
    }

    pub async fn send_transient(&self, topic: impl Into<String>, payload: impl Into<String>) -> anyhow::Result<()> {
        self.publish(topic.into(), payload.into(), false).await
    }

    #[tracing::instrument(skip(self, payload), fields(otel.name = format!("MQTT publish {}", topic)))]
    async fn publish(&self, topic: String, payload: String, retain: bool) -> anyhow::Result<()> {
        tracing::debug!("Publishing {} bytes", payload.len());

        self.client
            .publish(topic.as_str(), QoS::AtLeastOnce, retain, payload)
            .await
            .with_context(|| format!("Error publishing MQTT message to {}", topic))
    }
}
