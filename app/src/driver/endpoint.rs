use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::DriverKind;

#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub credential: Option<String>,
    pub timeout: Duration,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            credential: None,
            timeout,
        }
    }

    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }
}

impl Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub authenticated: bool,
    pub last_auth_attempt: Option<DateTime<Utc>>,
    pub endpoint: Option<Endpoint>,
}

/// Connection parameters per driver kind. Seeded from the settings file and updated from
/// the parameters the hub pushes on configuration changes.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub rf_device: Option<String>,
    pub cloud_url: Option<String>,
    pub cloud_token: Option<String>,
    pub timeout: Duration,
}

impl ConnectionSettings {
    pub fn endpoint(&self, kind: DriverKind) -> Option<Endpoint> {
        match kind {
            DriverKind::RfBlaster => self.rf_device.as_ref().map(|device| Endpoint::new(device, self.timeout)),
            DriverKind::CloudCurtain => self.cloud_url.as_ref().map(|url| {
                let endpoint = Endpoint::new(url, self.timeout);
                match &self.cloud_token {
                    Some(token) => endpoint.with_credential(token),
                    None => endpoint,
                }
            }),
        }
    }

    /// Empty values clear a setting. Unknown keys are left to the caller.
    pub fn apply_params(&mut self, params: &HashMap<String, String>) {
        fn non_empty(value: &str) -> Option<String> {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        }

        for (key, value) in params {
            match key.as_str() {
                "rf_device" => self.rf_device = non_empty(value),
                "cloud_url" => self.cloud_url = non_empty(value),
                "cloud_token" => self.cloud_token = non_empty(value),
                "timeout" => match value.trim().parse::<u64>() {
                    Ok(secs) if secs > 0 => self.timeout = Duration::from_secs(secs),
                    _ => tracing::warn!("Ignoring invalid timeout parameter {:?}", value),
                },
                _ => {}
            }
        }
    }
}
