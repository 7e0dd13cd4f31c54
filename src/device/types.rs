use std::fmt;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        *self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
        };

        write!(f, "{}", result)
    }
}

/// Beats per minute, as carried by the 8-bit Heart Rate Measurement value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct HeartRateReading(u8);

impl HeartRateReading {
    pub fn new(bpm: u8) -> Self {
        HeartRateReading(bpm)
    }

    pub fn bpm(&self) -> u8 {
        self.0
    }
}

impl From<u8> for HeartRateReading {
    fn from(bpm: u8) -> Self {
        HeartRateReading(bpm)
    }
}

impl fmt::Display for HeartRateReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bpm", self.0)
    }
}

/// Service UUIDs (or standard names) a discovered peripheral must advertise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilter {
    pub services: Vec<String>,
}

impl DiscoveryFilter {
    pub fn service(id: &str) -> Self {
        DiscoveryFilter { services: vec![id.to_string()] }
    }
}
