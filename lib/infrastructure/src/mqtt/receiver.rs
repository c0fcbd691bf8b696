use std::str::Utf8Error;

use rumqttc::v5::mqttbytes::v5::Publish;
use tokio::sync::mpsc;

/// Incoming publish with topic and payload decoded as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttInMessage {
    pub topic: String,
    pub payload: String,
}

impl TryFrom<&Publish> for MqttInMessage {
    type Error = Utf8Error;

    fn try_from(publish: &Publish) -> Result<Self, Self::Error> {
        let topic = std::str::from_utf8(&publish.topic)?;
        let payload = std::str::from_utf8(&publish.payload)?;

        Ok(Self {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
        })
    }
}

pub struct MqttSubscription {
    rx: mpsc::Receiver<MqttInMessage>,
}

impl MqttSubscription {
    pub(super) fn new(rx: mpsc::Receiver<MqttInMessage>) -> Self {
        Self { rx }
    }

    /// `None` once the connection has been dropped.
    pub async fn recv(&mut self) -> Option<MqttInMessage> {
        self.rx.recv().await
    }

    //Drops whatever is already queued, e.g. replies to an earlier request that timed out
    pub fn drain(&mut self) -> usize {
        std::iter::from_fn(|| self.rx.try_recv().ok()).count()
    }
}
