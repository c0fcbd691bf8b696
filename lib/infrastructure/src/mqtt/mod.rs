mod client;
mod receiver;
mod sender;

pub use client::Mqtt;
pub use receiver::{MqttInMessage, MqttSubscription};
pub use sender::MqttSender;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    host: String,
    port: u16,
    client_id: String,
    username: Option<String>,
    password: Option<String>,
}

impl MqttConfig {
    pub fn new_client(&self) -> Mqtt {
        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        };

        Mqtt::connect(&self.host, self.port, &self.client_id, credentials)
    }
}

/// Topic matching with MQTT wildcards (`+` for one level, trailing `#` for the rest).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(f), Some(t)) if f == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::topic_matches;

    #[test]
    fn matches_exact_topic() {
        assert!(topic_matches("hub/poll", "hub/poll"));
        assert!(!topic_matches("hub/poll", "hub/config"));
    }

    #[test]
    fn matches_single_level_wildcard() {
        assert!(topic_matches("tasmota/stat/+/STATUS", "tasmota/stat/rfbridge/STATUS"));
        assert!(!topic_matches("tasmota/stat/+/STATUS", "tasmota/stat/rfbridge/RESULT"));
    }

    #[test]
    fn matches_multi_level_wildcard() {
        assert!(topic_matches("hub/command/#", "hub/command/00004f6666696365/up"));
        assert!(!topic_matches("hub/command/#", "hub/poll"));
    }
}
