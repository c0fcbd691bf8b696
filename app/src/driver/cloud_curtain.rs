use anyhow::Context as _;
use infrastructure::HttpClientConfig;
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

use super::{DeviceTransport, Endpoint};
use crate::core::Payload;

/// Curtain controller reached through its vendor cloud HTTP API.
///
/// The endpoint host is the API base URL and the credential its bearer token. Command
/// payloads carry the verb the API expects, e.g. `open`.
#[derive(Default)]
pub struct CloudCurtainClient {
    client: Option<(Endpoint, ClientWithMiddleware)>,
}

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    command: &'a str,
}

impl CloudCurtainClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn client_for(&mut self, endpoint: &Endpoint) -> anyhow::Result<ClientWithMiddleware> {
        if let Some((current, client)) = &self.client {
            if current == endpoint {
                return Ok(client.clone());
            }
        }

        let client = HttpClientConfig::new(endpoint.credential.clone())
            .with_timeout(endpoint.timeout)
            .new_tracing_client()?;
        self.client = Some((endpoint.clone(), client.clone()));

        Ok(client)
    }
}

fn api_url(endpoint: &Endpoint, path: &str) -> String {
    format!("{}/api/{}", endpoint.host.trim_end_matches('/'), path)
}

#[async_trait::async_trait]
impl DeviceTransport for CloudCurtainClient {
    async fn authenticate(&mut self, endpoint: &Endpoint) -> anyhow::Result<bool> {
        let client = self.client_for(endpoint)?;
        let response = client.get(api_url(endpoint, "devices")).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(false),
            status if status.is_success() => Ok(true),
            status => anyhow::bail!("unexpected status {}", status),
        }
    }

    async fn send(&mut self, endpoint: &Endpoint, payload: &Payload, target: &str) -> anyhow::Result<()> {
        let verb = std::str::from_utf8(payload.as_bytes()).context("command payload is not text")?;
        let client = self.client_for(endpoint)?;

        let response = client
            .post(api_url(endpoint, &format!("devices/{}/commands", target)))
            .json(&CommandRequest { command: verb })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("command rejected with status {}: {}", status, body);
        }

        Ok(())
    }
}
