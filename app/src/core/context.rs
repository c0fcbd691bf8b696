use infrastructure::LogLevelControl;

/// Process-wide facts created once in `main` and read-only afterwards.
#[derive(Clone)]
pub struct BridgeContext {
    pub name: String,
    pub version: &'static str,
    pub log_control: Option<LogLevelControl>,
}

impl BridgeContext {
    pub fn new(name: impl Into<String>, log_control: Option<LogLevelControl>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION"),
            log_control,
        }
    }
}
