use std::fmt::Display;

use serde::Serialize;

const ADDRESS_LEN: usize = 12;

/// Stable node address of a device on the hub.
///
/// Derived from the logical name: the UTF-8 bytes as lowercase hex, left-padded with `0`
/// or cut to 12 characters. The hub limits node addresses to 14 characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    pub fn derive(logical_name: &str) -> Self {
        let encoded = hex::encode(logical_name.as_bytes());

        let address = if encoded.len() < ADDRESS_LEN {
            format!("{:0>width$}", encoded, width = ADDRESS_LEN)
        } else {
            encoded[..ADDRESS_LEN].to_string()
        };

        Self(address)
    }

    /// Accepts only addresses in canonical form, as handed out by [`DeviceAddress::derive`].
    pub fn parse(value: &str) -> Option<Self> {
        let canonical = value.len() == ADDRESS_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));

        canonical.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
