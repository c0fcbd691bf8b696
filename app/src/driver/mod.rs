mod cloud_curtain;
mod endpoint;
mod rf_blaster;
mod session;

pub use cloud_curtain::CloudCurtainClient;
pub use endpoint::{ConnectionSettings, ConnectionState, Endpoint};
pub use rf_blaster::TasmotaRfBridge;
pub use session::{DeviceTransport, SessionAdapter};

use crate::core::{BridgeError, DriverKind, Payload};

/// Uniform capability over one physical or cloud transport, shared by all devices of its kind.
///
/// Implementations serialize all access internally: an authentication attempt never
/// interleaves with an in-flight command on the same connection.
#[async_trait::async_trait]
pub trait DriverAdapter: Send + Sync {
    fn kind(&self) -> DriverKind;

    /// Stores the endpoint and authenticates against it. Fails with
    /// [`BridgeError::Connection`] when the endpoint is unreachable or rejects the credentials.
    async fn connect(&self, endpoint: Endpoint) -> Result<ConnectionState, BridgeError>;

    /// Fails with [`BridgeError::Transport`] on I/O failure or when the session cannot be
    /// re-authenticated.
    async fn send_command(&self, payload: &Payload, target: &str) -> Result<(), BridgeError>;

    async fn connection_state(&self) -> ConnectionState;
}
