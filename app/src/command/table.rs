use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use base64::Engine as _;
use serde::Deserialize;

use crate::core::{BridgeError, CommandRole, DeviceAddress, DriverKind, Payload};

#[derive(Debug, Clone)]
pub struct CommandTableEntry {
    logical_name: String,
    address: DeviceAddress,
    driver: DriverKind,
    target: String,
    payloads: BTreeMap<CommandRole, Payload>,
}

impl CommandTableEntry {
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn driver(&self) -> DriverKind {
        self.driver
    }

    /// Device id on the remote side. Falls back to the logical name.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn payload(&self, role: CommandRole) -> Option<&Payload> {
        self.payloads.get(&role)
    }

    pub fn roles(&self) -> impl Iterator<Item = CommandRole> + '_ {
        self.payloads.keys().copied()
    }
}

/// Pre-recorded payloads per logical device name. Loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    entries: BTreeMap<String, CommandTableEntry>,
}

impl CommandTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::config(format!("cannot read {}: {}", path.display(), e)))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let table = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };

        tracing::info!("Loaded {} devices from command table {}", table.len(), path.display());
        Ok(table)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BridgeError> {
        let source: TableSource = toml::from_str(content).map_err(|e| BridgeError::config(e.to_string()))?;
        Self::try_from(source)
    }

    pub fn from_json_str(content: &str) -> Result<Self, BridgeError> {
        let source: TableSource = serde_json::from_str(content).map_err(|e| BridgeError::config(e.to_string()))?;
        Self::try_from(source)
    }

    pub fn get(&self, logical_name: &str) -> Option<&CommandTableEntry> {
        self.entries.get(logical_name)
    }

    pub fn entries_of(&self, kind: DriverKind) -> impl Iterator<Item = &CommandTableEntry> {
        self.entries.values().filter(move |entry| entry.driver == kind)
    }

    pub fn driver_kinds(&self) -> BTreeSet<DriverKind> {
        self.entries.values().map(|entry| entry.driver).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableSource {
    #[serde(default)]
    devices: BTreeMap<String, EntrySource>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntrySource {
    #[serde(default)]
    driver: Option<DriverKind>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    encoding: Option<PayloadEncoding>,
    payloads: PayloadSource,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PayloadSource {
    Ordered(Vec<String>),
    ByRole(BTreeMap<CommandRole, String>),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PayloadEncoding {
    Hex,
    Base64,
    Text,
}

impl PayloadEncoding {
    fn default_for(kind: DriverKind) -> Self {
        match kind {
            DriverKind::RfBlaster => PayloadEncoding::Hex,
            DriverKind::CloudCurtain => PayloadEncoding::Text,
        }
    }

    fn decode(self, value: &str) -> Result<Payload, String> {
        match self {
            PayloadEncoding::Hex => {
                let compact: String = value.split_whitespace().collect();
                hex::decode(compact).map(Payload::from).map_err(|e| e.to_string())
            }
            PayloadEncoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(value.trim())
                .map(Payload::from)
                .map_err(|e| e.to_string()),
            PayloadEncoding::Text => Ok(Payload::from(value)),
        }
    }
}

impl TryFrom<TableSource> for CommandTable {
    type Error = BridgeError;

    fn try_from(source: TableSource) -> Result<Self, Self::Error> {
        if source.devices.is_empty() {
            return Err(BridgeError::config("no devices defined"));
        }

        let mut entries = BTreeMap::new();
        let mut names_by_address: HashMap<DeviceAddress, String> = HashMap::new();

        for (name, entry) in source.devices {
            let entry = parse_entry(&name, entry)?;

            if let Some(other) = names_by_address.insert(entry.address.clone(), name.clone()) {
                return Err(BridgeError::config(format!(
                    "'{}' and '{}' both map to address {}",
                    other, name, entry.address
                )));
            }

            entries.insert(name, entry);
        }

        Ok(Self { entries })
    }
}

fn parse_entry(name: &str, source: EntrySource) -> Result<CommandTableEntry, BridgeError> {
    if name.trim().is_empty() {
        return Err(BridgeError::config("device with empty name"));
    }

    let driver = source.driver.unwrap_or(DriverKind::RfBlaster);
    let encoding = source.encoding.unwrap_or(PayloadEncoding::default_for(driver));

    let target = match (driver, source.target) {
        (_, Some(target)) if !target.trim().is_empty() => target.trim().to_string(),
        (DriverKind::CloudCurtain, _) => {
            return Err(BridgeError::config(format!("'{}' needs a target for the {}", name, driver)));
        }
        (_, _) => name.to_string(),
    };

    let raw: Vec<(CommandRole, String)> = match source.payloads {
        PayloadSource::Ordered(list) => {
            if list.len() > CommandRole::ALL.len() {
                return Err(BridgeError::config(format!(
                    "'{}' has {} payloads, at most {} are supported",
                    name,
                    list.len(),
                    CommandRole::ALL.len()
                )));
            }
            CommandRole::ALL.into_iter().zip(list).collect()
        }
        PayloadSource::ByRole(map) => map.into_iter().collect(),
    };

    if raw.is_empty() {
        return Err(BridgeError::config(format!("'{}' has no payloads", name)));
    }

    let mut payloads = BTreeMap::new();
    for (role, value) in raw {
        let payload = encoding
            .decode(&value)
            .map_err(|e| BridgeError::config(format!("'{}' has an invalid {} payload: {}", name, role, e)))?;

        if payload.is_empty() {
            return Err(BridgeError::config(format!("'{}' has no payload for role {}", name, role)));
        }

        payloads.insert(role, payload);
    }

    Ok(CommandTableEntry {
        logical_name: name.to_string(),
        address: DeviceAddress::derive(name),
        driver,
        target,
        payloads,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
        [devices.Office]
        payloads = ["aab0210355", "aab0210455", "aab0210555"]

        [devices."Living Room"]
        driver = "cloud_curtain"
        target = "curtain-42"
        payloads = { open = "open", close = "close" }

        [devices.Den]
        encoding = "base64"
        payloads = { stop = "qrAhBVU=" }
    "#;

    fn config_error(result: Result<CommandTable, BridgeError>) -> String {
        match result {
            Err(BridgeError::Config(message)) => message,
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn loads_ordered_and_keyed_payloads() {
        let table = CommandTable::from_toml_str(TABLE).unwrap();

        assert_eq!(table.len(), 3);

        let office = table.get("Office").unwrap();
        assert_eq!(office.driver(), DriverKind::RfBlaster);
        assert_eq!(office.target(), "Office");
        assert_eq!(office.address().as_str(), "4f6666696365");
        assert_eq!(
            office.payload(CommandRole::Down),
            Some(&Payload::from(vec![0xaa, 0xb0, 0x21, 0x04, 0x55]))
        );

        let living_room = table.get("Living Room").unwrap();
        assert_eq!(living_room.target(), "curtain-42");
        assert_eq!(living_room.payload(CommandRole::Up), Some(&Payload::from("open")));
        assert_eq!(living_room.payload(CommandRole::Stop), None);

        let den = table.get("Den").unwrap();
        assert_eq!(
            den.payload(CommandRole::Stop),
            Some(&Payload::from(vec![0xaa, 0xb0, 0x21, 0x05, 0x55]))
        );
        assert_eq!(den.roles().collect::<Vec<_>>(), vec![CommandRole::Stop]);
    }

    #[test]
    fn driver_kinds_in_table() {
        let table = CommandTable::from_toml_str(TABLE).unwrap();

        assert_eq!(
            table.driver_kinds(),
            BTreeSet::from([DriverKind::RfBlaster, DriverKind::CloudCurtain])
        );
        assert_eq!(table.entries_of(DriverKind::CloudCurtain).count(), 1);
    }

    #[test]
    fn loads_json() {
        let table = CommandTable::from_json_str(
            r#"{ "devices": { "Office": { "payloads": { "up": "aa55", "down": "aa56" } } } }"#,
        )
        .unwrap();

        assert_eq!(
            table.get("Office").unwrap().payload(CommandRole::Up),
            Some(&Payload::from(vec![0xaa, 0x55]))
        );
    }

    #[test]
    fn rejects_empty_payload() {
        let message = config_error(CommandTable::from_toml_str(
            r#"
            [devices.Office]
            payloads = ["aa55", ""]
            "#,
        ));

        assert!(message.contains("Office"));
        assert!(message.contains("down"));
    }

    #[test]
    fn rejects_too_many_payloads() {
        config_error(CommandTable::from_toml_str(
            r#"
            [devices.Office]
            payloads = ["aa", "bb", "cc", "dd"]
            "#,
        ));
    }

    #[test]
    fn rejects_invalid_hex() {
        config_error(CommandTable::from_toml_str(
            r#"
            [devices.Office]
            payloads = ["not hex"]
            "#,
        ));
    }

    #[test]
    fn rejects_cloud_device_without_target() {
        let message = config_error(CommandTable::from_toml_str(
            r#"
            [devices.Kitchen]
            driver = "cloud_curtain"
            payloads = ["open"]
            "#,
        ));

        assert!(message.contains("target"));
    }

    #[test]
    fn rejects_address_collision() {
        //both names truncate to the same 12 hex characters
        let message = config_error(CommandTable::from_toml_str(
            r#"
            [devices."Bedroom left"]
            payloads = ["aa"]

            [devices."Bedroom right"]
            payloads = ["bb"]
            "#,
        ));

        assert!(message.contains("Bedroom left"));
        assert!(message.contains("Bedroom right"));
    }

    #[test]
    fn rejects_empty_table() {
        config_error(CommandTable::from_toml_str(""));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        config_error(CommandTable::load("/nonexistent/commands.toml"));
    }
}
