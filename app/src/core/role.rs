use std::fmt::Debug;

use serde::{Deserialize, Serialize};

/// Semantic slot a payload fills for a device. The position in an ordered payload list
/// is the role index: 0 = up/open, 1 = down/close, 2 = stop.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum CommandRole {
    #[serde(alias = "open")]
    #[display("up")]
    Up,
    #[serde(alias = "close")]
    #[display("down")]
    Down,
    #[display("stop")]
    Stop,
}

impl CommandRole {
    /// In payload list order.
    pub const ALL: [CommandRole; 3] = [CommandRole::Up, CommandRole::Down, CommandRole::Stop];

    /// Resolves a command name sent by the hub, including the legacy node command ids.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "up" | "open" | "bup" => Some(CommandRole::Up),
            "down" | "close" | "bdown" => Some(CommandRole::Down),
            "stop" | "bstop" => Some(CommandRole::Stop),
            _ => None,
        }
    }
}

/// Pre-recorded command payload, replayed verbatim.
#[derive(Clone, PartialEq, Eq, derive_more::From)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

//RF captures are several hundred bytes, keep logs readable
impl Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let head = hex::encode(&self.0[..self.0.len().min(8)]);
        if self.0.len() > 8 {
            write!(f, "Payload[{} bytes: {}..]", self.0.len(), head)
        } else {
            write!(f, "Payload[{} bytes: {}]", self.0.len(), head)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_from_hub() {
        assert_eq!(CommandRole::from_name("up"), Some(CommandRole::Up));
        assert_eq!(CommandRole::from_name("OPEN"), Some(CommandRole::Up));
        assert_eq!(CommandRole::from_name("BDOWN"), Some(CommandRole::Down));
        assert_eq!(CommandRole::from_name("close"), Some(CommandRole::Down));
        assert_eq!(CommandRole::from_name(" stop "), Some(CommandRole::Stop));
        assert_eq!(CommandRole::from_name("nonexistent"), None);
    }

    #[test]
    fn role_deserializes_with_aliases() {
        let role: CommandRole = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(role, CommandRole::Up);

        let role: CommandRole = serde_json::from_str("\"stop\"").unwrap();
        assert_eq!(role, CommandRole::Stop);
    }

    #[test]
    fn payload_debug_is_shortened() {
        let payload = Payload::from(vec![0xb2, 0x00, 0x1a, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

        assert_eq!(format!("{:?}", payload), "Payload[10 bytes: b2001a0001020304..]");
    }
}
