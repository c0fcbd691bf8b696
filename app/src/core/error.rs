use super::DriverKind;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Invalid command table: {0}")]
    Config(String),

    #[error("Cannot connect to {driver}: {reason}")]
    Connection { driver: DriverKind, reason: String },

    #[error("Unknown device {0}")]
    UnknownDevice(String),

    #[error("Unknown command '{command}' for device {address}")]
    UnknownCommand { address: String, command: String },

    #[error("Sending command via {driver} failed: {reason}")]
    Transport { driver: DriverKind, reason: String },
}

impl BridgeError {
    pub fn config(message: impl Into<String>) -> Self {
        BridgeError::Config(message.into())
    }

    pub fn connection(driver: DriverKind, reason: impl ToString) -> Self {
        BridgeError::Connection {
            driver,
            reason: reason.to_string(),
        }
    }

    pub fn unknown_command(address: impl ToString, command: impl ToString) -> Self {
        BridgeError::UnknownCommand {
            address: address.to_string(),
            command: command.to_string(),
        }
    }

    pub fn transport(driver: DriverKind, reason: impl ToString) -> Self {
        BridgeError::Transport {
            driver,
            reason: reason.to_string(),
        }
    }
}
