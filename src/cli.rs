use clap::Parser;
use log::LevelFilter;

use crate::config::types::Config;

/// Connects to a Bluetooth LE heart rate monitor and prints the heart rate it reports.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Args {
    /// Only connect to the peripheral with this name
    #[arg(long)]
    pub device_name: Option<String>,

    /// How long to scan for a heart rate monitor (milliseconds)
    #[arg(long, value_name = "MS")]
    pub scan_timeout: Option<u64>,

    /// Give up connecting after this long (milliseconds)
    #[arg(long, value_name = "MS")]
    pub connect_timeout: Option<u64>,

    /// Print one JSON object per reading
    #[arg(long)]
    pub json: bool,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// Write the effective configuration back to the config file
    #[arg(long)]
    pub save_config: bool,
}

impl Args {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose { LevelFilter::Debug } else { LevelFilter::Info }
    }

    /// Command line flags win over the config file.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(name) = &self.device_name {
            config.device_name = Some(name.clone());
        }
        if let Some(ms) = self.scan_timeout {
            config.scan_timeout_ms = ms;
        }
        if let Some(ms) = self.connect_timeout {
            config.connect_timeout_ms = Some(ms);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file() {
        let args = Args::parse_from(["heart-rate-link", "--device-name", "HRM-Pro", "--connect-timeout", "15000"]);
        let file = Config { scan_timeout_ms: 2500, device_name: Some("Other".to_string()), ..Config::default() };

        let config = args.apply(file);
        assert_eq!(config.device_name.as_deref(), Some("HRM-Pro"));
        assert_eq!(config.scan_timeout_ms, 2500);
        assert_eq!(config.connect_timeout_ms, Some(15000));
        assert_eq!(args.log_level(), LevelFilter::Info);
    }
}
