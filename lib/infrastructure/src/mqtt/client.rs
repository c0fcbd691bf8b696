use std::sync::Arc;
use std::time::Duration;

use rumqttc::v5::mqttbytes::v5::{ConnectProperties, Packet, Publish};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::Event::Incoming;
use rumqttc::v5::{AsyncClient, EventLoop, MqttOptions};
use tokio::sync::mpsc;

use super::*;

const RECONNECT_DELAY: Duration = Duration::from_secs(2);
const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker connection. Subscriptions are registered before [`Mqtt::run`] takes over the
/// event loop; incoming publishes are routed by matching the topic against each filter.
pub struct Mqtt {
    client: Arc<AsyncClient>,
    event_loop: EventLoop,
    routes: Vec<Route>,
}

struct Route {
    filter: String,
    subscribers: Vec<mpsc::Sender<MqttInMessage>>,
}

impl Mqtt {
    pub fn connect(host: &str, port: u16, client_id: &str, credentials: Option<(&str, &str)>) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(5));
        options.set_clean_start(false);

        if let Some((username, password)) = credentials {
            options.set_credentials(username, password);
        }

        let mut connect_props = ConnectProperties::new();
        connect_props.session_expiry_interval = 60.into();
        connect_props.max_packet_size = Some(1024 * 1024);
        options.set_connect_properties(connect_props);

        let (client, event_loop) = AsyncClient::new(options, 10);

        Mqtt {
            client: Arc::new(client),
            event_loop,
            routes: vec![],
        }
    }

    pub async fn subscribe(&mut self, filter: impl Into<String>) -> anyhow::Result<MqttSubscription> {
        self.subscribe_all(&[filter.into()]).await
    }

    /// One receiver for all given filters.
    pub async fn subscribe_all(&mut self, filters: &[String]) -> anyhow::Result<MqttSubscription> {
        let (tx, rx) = mpsc::channel::<MqttInMessage>(32);

        for filter in filters {
            if let Some(route) = self.routes.iter_mut().find(|r| r.filter == *filter) {
                tracing::debug!("Sharing existing subscription for {}", filter);
                route.subscribers.push(tx.clone());
                continue;
            }

            tracing::info!("Subscribing to {}", filter);
            self.client.subscribe(filter.as_str(), QoS::AtLeastOnce).await?;

            self.routes.push(Route {
                filter: filter.clone(),
                subscribers: vec![tx.clone()],
            });
        }

        Ok(MqttSubscription::new(rx))
    }

    pub fn sender(&self) -> MqttSender {
        MqttSender::new(self.client.clone())
    }

    /// Drives the connection until the process ends. Connection errors are retried.
    pub async fn run(mut self) {
        loop {
            match self.event_loop.poll().await {
                Ok(Incoming(Packet::Publish(publish))) => Self::forward(&self.routes, &publish).await,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("MQTT connection error, retrying in {:?}: {}", RECONNECT_DELAY, e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn forward(routes: &[Route], publish: &Publish) {
        let msg: MqttInMessage = match publish.try_into() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Dropping MQTT message that is not UTF-8: {}", e);
                return;
            }
        };

        let mut receivers: Vec<&mpsc::Sender<MqttInMessage>> = vec![];
        for route in routes.iter().filter(|r| topic_matches(&r.filter, &msg.topic)) {
            for tx in &route.subscribers {
                if !receivers.iter().any(|known| known.same_channel(tx)) {
                    receivers.push(tx);
                }
            }
        }

        if receivers.is_empty() {
            tracing::trace!("No subscriber for {}", msg.topic);
        }

        for tx in receivers {
            if let Err(e) = tx.send_timeout(msg.clone(), FORWARD_TIMEOUT).await {
                tracing::error!("Failed to forward MQTT message on {}: {}", msg.topic, e);
            }
        }
    }
}
