use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use super::{ConnectionState, DriverAdapter, Endpoint};
use crate::core::{BridgeError, DriverKind, Payload};

/// Raw protocol operations of one transport. Timeouts, session bookkeeping and
/// serialization are handled by [`SessionAdapter`].
#[async_trait::async_trait]
pub trait DeviceTransport: Send {
    /// `Ok(false)` means the endpoint answered but refused the credentials.
    async fn authenticate(&mut self, endpoint: &Endpoint) -> anyhow::Result<bool>;

    async fn send(&mut self, endpoint: &Endpoint, payload: &Payload, target: &str) -> anyhow::Result<()>;
}

struct Session<T> {
    transport: T,
    state: ConnectionState,
}

impl<T: DeviceTransport> Session<T> {
    async fn authenticate(&mut self, endpoint: &Endpoint) -> Result<(), String> {
        self.state.last_auth_attempt = Some(Utc::now());

        let outcome = match tokio::time::timeout(endpoint.timeout, self.transport.authenticate(endpoint)).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err("credentials rejected".to_string()),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(_) => Err(format!("no answer within {:?}", endpoint.timeout)),
        };

        self.state.authenticated = outcome.is_ok();
        outcome
    }

    fn is_stale(&self, max_age: Duration) -> bool {
        if !self.state.authenticated {
            return true;
        }

        match self.state.last_auth_attempt {
            //negative age means the clock moved backwards, keep the session
            Some(at) => (Utc::now() - at).to_std().is_ok_and(|age| age > max_age),
            None => true,
        }
    }
}

/// One connection per driver kind, shared by every device record of that kind.
pub struct SessionAdapter<T> {
    kind: DriverKind,
    max_session_age: Duration,
    session: Mutex<Session<T>>,
}

impl<T: DeviceTransport> SessionAdapter<T> {
    pub fn new(kind: DriverKind, transport: T, max_session_age: Duration) -> Self {
        Self {
            kind,
            max_session_age,
            session: Mutex::new(Session {
                transport,
                state: ConnectionState::default(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl<T: DeviceTransport + 'static> DriverAdapter for SessionAdapter<T> {
    fn kind(&self) -> DriverKind {
        self.kind
    }

    #[tracing::instrument(skip(self), fields(driver = %self.kind))]
    async fn connect(&self, endpoint: Endpoint) -> Result<ConnectionState, BridgeError> {
        let mut session = self.session.lock().await;
        session.state.endpoint = Some(endpoint.clone());

        match session.authenticate(&endpoint).await {
            Ok(()) => {
                tracing::info!("Connected to {} at {}", self.kind, endpoint.host);
                Ok(session.state.clone())
            }
            Err(reason) => {
                tracing::warn!("Connecting to {} at {} failed: {}", self.kind, endpoint.host, reason);
                Err(BridgeError::connection(self.kind, reason))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(driver = %self.kind))]
    async fn send_command(&self, payload: &Payload, target: &str) -> Result<(), BridgeError> {
        let mut session = self.session.lock().await;

        let Some(endpoint) = session.state.endpoint.clone() else {
            return Err(BridgeError::transport(self.kind, "no endpoint configured"));
        };

        if session.is_stale(self.max_session_age) {
            tracing::debug!("Session of {} is stale, re-authenticating", self.kind);
            session
                .authenticate(&endpoint)
                .await
                .map_err(|reason| BridgeError::transport(self.kind, format!("re-authentication failed: {}", reason)))?;
        }

        let result = tokio::time::timeout(endpoint.timeout, session.transport.send(&endpoint, payload, target)).await;

        match result {
            Ok(Ok(())) => {
                tracing::debug!("Sent {:?} to {}", payload, target);
                Ok(())
            }
            Ok(Err(e)) => {
                session.state.authenticated = false;
                Err(BridgeError::transport(self.kind, format!("{:#}", e)))
            }
            Err(_) => {
                session.state.authenticated = false;
                Err(BridgeError::transport(
                    self.kind,
                    format!("no answer within {:?}", endpoint.timeout),
                ))
            }
        }
    }

    async fn connection_state(&self) -> ConnectionState {
        self.session.lock().await.state.clone()
    }
}
