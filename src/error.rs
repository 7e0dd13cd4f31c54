use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use btleplug;
use serde_json;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("Unknown GATT identifier: {0}")]
    UnknownIdentifier(String),
}

/// Why `connect()` did not reach the connected state. One variant per handshake stage.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Bluetooth LE is not supported on this platform")]
    CapabilityUnavailable,

    #[error("No device found / requested")]
    NoDeviceSelected {
        #[source]
        source: Option<DeviceError>,
    },

    #[error("Connection failed to device {device}")]
    GattConnectFailed {
        device: String,
        #[source]
        source: Option<DeviceError>,
    },

    #[error("Could not retrieve service {service} on device {device}")]
    ServiceNotFound {
        device: String,
        service: String,
        #[source]
        source: Option<DeviceError>,
    },

    #[error("Could not retrieve characteristic {characteristic} on device {device}")]
    CharacteristicNotFound {
        device: String,
        characteristic: String,
        #[source]
        source: Option<DeviceError>,
    },

    #[error("Failed to enable notifications on device {device}: {source}")]
    SubscriptionFailed {
        device: String,
        #[source]
        source: DeviceError,
    },

    #[error("Device {device} disconnected during the handshake")]
    ConnectionLost { device: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Heart rate measurement too short: {len} byte(s)")]
    TooShort { len: usize },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (device): {source}")]
    DeviceError { #[from] source: DeviceError },

    #[error("Failed to connect: {source}")]
    ConnectError { #[from] source: ConnectError },

    #[error("Timed out after {0} ms while connecting")]
    ConnectTimeout(u64),

    #[error("Failed to write output: {source}")]
    IOError { #[from] source: io::Error },
}
