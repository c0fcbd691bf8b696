mod http;
mod monitoring;
mod mqtt;

pub use monitoring::{LogLevelControl, MonitoringConfig};

pub use http::client::HttpClientConfig;
pub use mqtt::{topic_matches, Mqtt, MqttConfig, MqttInMessage, MqttSender, MqttSubscription};
