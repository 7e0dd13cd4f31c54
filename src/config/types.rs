use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::device::btle::BtleSettings;
use crate::device::constants::DEFAULT_SCAN_TIMEOUT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// How long (milliseconds) to scan for a heart rate peripheral.
    pub scan_timeout_ms: u64,
    /// Give up on `connect()` after this many milliseconds. Unset means wait indefinitely.
    pub connect_timeout_ms: Option<u64>,
    /// Only connect to the peripheral advertising this local name.
    pub device_name: Option<String>,
}

impl Config {
    pub fn btle_settings(&self) -> BtleSettings {
        BtleSettings {
            scan_timeout: Duration::from_millis(self.scan_timeout_ms),
            device_name: self.device_name.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT,
            connect_timeout_ms: None,
            device_name: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"deviceName": "Polar H10"}"#).unwrap();

        assert_eq!(config.scan_timeout_ms, DEFAULT_SCAN_TIMEOUT);
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.btle_settings().device_name.as_deref(), Some("Polar H10"));
    }

    #[test]
    fn keys_are_camel_case() {
        let config = Config { connect_timeout_ms: Some(5000), ..Config::default() };
        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(json["connectTimeoutMs"], 5000);
        assert_eq!(json["scanTimeoutMs"], DEFAULT_SCAN_TIMEOUT);
    }
}
