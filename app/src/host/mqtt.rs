use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context as _;
use infrastructure::{MqttInMessage, MqttSender, MqttSubscription, topic_matches};
use serde_json::json;

use super::{Bridge, CommandArgs, HostPort, PollKind};

/// Hub connection over MQTT. The hub publishes configuration, poll ticks and commands
/// below the base topic and reads node definitions and states from there.
pub struct MqttHost {
    base_topic: String,
    sender: MqttSender,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    ConfigChanged(HashMap<String, String>),
    PollTick(PollKind),
    Command {
        address: String,
        command: String,
        args: CommandArgs,
    },
}

impl MqttHost {
    pub fn new(base_topic: &str, sender: MqttSender) -> Self {
        Self {
            base_topic: base_topic.trim_matches('/').to_string(),
            sender,
        }
    }

    pub fn subscription_topics(&self) -> Vec<String> {
        vec![
            format!("{}/config", self.base_topic),
            format!("{}/poll", self.base_topic),
            format!("{}/command/+/+", self.base_topic),
        ]
    }

    async fn report_command_result(&self, address: &str, command: &str, result: &str) {
        let topic = format!("{}/result/{}/{}", self.base_topic, address, command);

        if let Err(e) = self.sender.send_transient(topic, result).await {
            tracing::error!("Error publishing command result for {}: {:?}", address, e);
        }
    }
}

#[async_trait::async_trait]
impl HostPort for MqttHost {
    async fn register_device(&self, address: &str, display_name: &str, capabilities: &[String]) -> anyhow::Result<()> {
        self.sender
            .send_retained_json(
                format!("{}/node/{}", self.base_topic, address),
                &node_payload(display_name, capabilities),
            )
            .await
    }

    async fn report_state(&self, address: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.sender
            .send_retained(format!("{}/state/{}/{}", self.base_topic, address, key), value)
            .await
    }
}

fn node_payload(display_name: &str, capabilities: &[String]) -> serde_json::Value {
    json!({
        "name": display_name,
        "capabilities": capabilities,
    })
}

pub fn parse_message(base_topic: &str, msg: &MqttInMessage) -> anyhow::Result<Option<HostMessage>> {
    let base_topic = base_topic.trim_matches('/');

    if msg.topic == format!("{}/config", base_topic) {
        return Ok(Some(HostMessage::ConfigChanged(parse_string_map(&msg.payload)?)));
    }

    if msg.topic == format!("{}/poll", base_topic) {
        let kind = PollKind::from_name(&msg.payload).with_context(|| format!("unknown poll kind {:?}", msg.payload))?;
        return Ok(Some(HostMessage::PollTick(kind)));
    }

    if topic_matches(&format!("{}/command/+/+", base_topic), &msg.topic) {
        let mut levels = msg.topic.rsplit('/');
        let (Some(command), Some(address)) = (levels.next(), levels.next()) else {
            return Ok(None);
        };

        return Ok(Some(HostMessage::Command {
            address: address.to_string(),
            command: command.to_string(),
            args: parse_string_map(&msg.payload)?,
        }));
    }

    Ok(None)
}

//Non-string JSON values are kept in their JSON text form
fn parse_string_map(payload: &str) -> anyhow::Result<HashMap<String, String>> {
    if payload.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let values: HashMap<String, serde_json::Value> =
        serde_json::from_str(payload).context("expected a JSON object")?;

    Ok(values
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// Forwards hub messages to the bridge until the subscription closes. Each message is
/// handled on its own task, so a slow command does not hold up polls.
pub async fn process_host_messages(bridge: Arc<Bridge>, host: Arc<MqttHost>, mut rx: MqttSubscription) {
    while let Some(msg) = rx.recv().await {
        let message = match parse_message(&host.base_topic, &msg) {
            Ok(Some(message)) => message,
            Ok(None) => {
                tracing::trace!("Ignoring message on {}", msg.topic);
                continue;
            }
            Err(e) => {
                tracing::warn!("Ignoring invalid message on {}: {:?}", msg.topic, e);
                continue;
            }
        };

        let bridge = bridge.clone();
        let host = host.clone();
        tokio::spawn(async move { handle_message(&bridge, &host, message).await });
    }

    tracing::error!("Hub subscription closed");
}

async fn handle_message(bridge: &Bridge, host: &MqttHost, message: HostMessage) {
    match message {
        HostMessage::ConfigChanged(params) => {
            bridge.on_config_changed(&params).await;
        }
        HostMessage::PollTick(kind) => bridge.on_poll_tick(kind).await,
        HostMessage::Command { address, command, args } => {
            let result = command_result(bridge, &address, &command, &args).await;
            host.report_command_result(&address, &command, &result).await;
        }
    }
}

//"ok" or the error text shown to the user
async fn command_result(bridge: &Bridge, address: &str, command: &str, args: &CommandArgs) -> String {
    match bridge.on_command(address, command, args).await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!("Command {} for {} failed: {}", command, address, e);
            e.to_string()
        }
    }
}
