
use std::sync::{Arc, Mutex};

use crate::command::CommandTable;
use crate::core::Payload;
use crate::driver::{DeviceTransport, Endpoint};
use crate::host::{CONTROLLER_ADDRESS, HostPort};

pub fn mixed_table() -> CommandTable {
    CommandTable::from_toml_str(
        r#"
        [devices.Office]
        payloads = ["aab0210355", "aab0210455", "aab0210555"]

        [devices.Den]
        payloads = { down = "aab0220455", stop = "aab0220555" }

        [devices."Living Room"]
        driver = "cloud_curtain"
        target = "curtain-42"
        payloads = { open = "open", close = "close", stop = "stop" }
        "#,
    )
    .unwrap()
}

#[derive(Debug, Default)]
struct FakeTransportState {
    accept_auth: bool,
    hang_auth: bool,
    fail_send: bool,
    auth_attempts: usize,
    sent: Vec<(Payload, String)>,
}

/// Scriptable transport. Clones share their state, so a test keeps a handle after moving
/// one clone into an adapter.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeTransportState>>,
}

impl FakeTransport {
    pub fn accepting() -> Self {
        let transport = Self::default();
        transport.set_accept_auth(true);
        transport
    }

    pub fn rejecting() -> Self {
        Self::default()
    }

    pub fn set_accept_auth(&self, accept: bool) {
        self.state.lock().unwrap().accept_auth = accept;
    }

    pub fn set_hang_auth(&self, hang: bool) {
        self.state.lock().unwrap().hang_auth = hang;
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }

    pub fn auth_attempts(&self) -> usize {
        self.state.lock().unwrap().auth_attempts
    }

    pub fn sent(&self) -> Vec<(Payload, String)> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait::async_trait]
impl DeviceTransport for FakeTransport {
    async fn authenticate(&mut self, _endpoint: &Endpoint) -> anyhow::Result<bool> {
        let (accept, hang) = {
            let mut state = self.state.lock().unwrap();
            state.auth_attempts += 1;
            (state.accept_auth, state.hang_auth)
        };

        if hang {
            std::future::pending::<()>().await;
        }

        Ok(accept)
    }

    async fn send(&mut self, _endpoint: &Endpoint, payload: &Payload, target: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();

        if state.fail_send {
            anyhow::bail!("link down");
        }

        state.sent.push((payload.clone(), target.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub address: String,
    pub name: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    registrations: Mutex<Vec<Registration>>,
    reports: Mutex<Vec<(String, String, String)>>,
    failing_registrations: Mutex<usize>,
}

impl RecordingHost {
    /// The next `count` device registrations fail. The controller node is never refused.
    pub fn fail_device_registrations(&self, count: usize) {
        *self.failing_registrations.lock().unwrap() = count;
    }

    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn registered_addresses(&self) -> Vec<String> {
        self.registrations().into_iter().map(|r| r.address).collect()
    }

    pub fn last_report(&self, address: &str, key: &str) -> Option<String> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(a, k, _)| a == address && k == key)
            .map(|(_, _, value)| value.clone())
    }

    pub fn report_count(&self, address: &str, key: &str) -> usize {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, k, _)| a == address && k == key)
            .count()
    }
}

#[async_trait::async_trait]
impl HostPort for RecordingHost {
    async fn register_device(&self, address: &str, display_name: &str, capabilities: &[String]) -> anyhow::Result<()> {
        if address != CONTROLLER_ADDRESS {
            let mut failing = self.failing_registrations.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                anyhow::bail!("hub refused {}", address);
            }
        }

        self.registrations.lock().unwrap().push(Registration {
            address: address.to_string(),
            name: display_name.to_string(),
            capabilities: capabilities.to_vec(),
        });
        Ok(())
    }

    async fn report_state(&self, address: &str, key: &str, value: &str) -> anyhow::Result<()> {
        self.reports
            .lock()
            .unwrap()
            .push((address.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }
}
