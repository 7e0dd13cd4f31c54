use std::env::current_exe;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str;
use directories_next::ProjectDirs;
use fd_lock::{RwLock, RwLockWriteGuard};
use log::{info, warn};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::config::types::Config;
use crate::error::ConfigError;

// <exe name>.json next to the executable wins when it exists
fn find_config_path() -> Result<PathBuf, ConfigError> {
    let portable = current_exe().ok().map(|exe| exe.with_extension("json"));
    if let Some(path) = portable.filter(|path| path.is_file()) {
        return Ok(path);
    }

    ProjectDirs::from("org", "heart-rate-link", "heart-rate-link")
        .map(|dirs| dirs.config_dir().join("heart-rate-link.json"))
        .ok_or(ConfigError::NoConfigPath)
}

/// The JSON config file, opened once for reading, saving and the single-instance lock.
pub struct ConfigIO {
    file: std::fs::File,
}

impl ConfigIO {
    pub fn new_sync() -> Result<Self, ConfigError> {
        Self::open(&find_config_path()?)
    }

    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        info!("Using config file {}", path.to_string_lossy());

        if let Some(directory) = path.parent() {
            std::fs::create_dir_all(directory)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .create(true)
            .open(path)?;

        Ok(ConfigIO { file })
    }

    /// A second instance would fight over the same peripheral, so the caller holds this lock while running.
    pub fn locker(&self) -> Result<ConfigIOLocker, ConfigError> {
        Ok(ConfigIOLocker { rw_lock: RwLock::new(self.file.try_clone()?) })
    }

    fn async_file(&self) -> Result<File, ConfigError> {
        Ok(File::from_std(self.file.try_clone()?))
    }

    pub async fn read(&self) -> Result<Config, ConfigError> {
        let mut file = self.async_file()?;
        let mut content = vec![];
        file.rewind().await?;
        file.read_to_end(&mut content).await?;

        if content.is_empty() {
            return Ok(Config::default());
        }

        Ok(serde_json::from_str(str::from_utf8(&content)?)?)
    }

    pub async fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let mut file = self.async_file()?;
        info!("Saving config");

        let content = serde_json::to_string_pretty(config)?;
        file.rewind().await?;
        file.set_len(0).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

pub struct ConfigIOLocker {
    rw_lock: RwLock<std::fs::File>,
}

impl ConfigIOLocker {
    pub fn lock(&mut self) -> Result<RwLockWriteGuard<std::fs::File>, ConfigError> {
        self.rw_lock.try_write().map_err(|source| {
            warn!("Config file is locked by another instance");
            ConfigError::CanNotLock { source }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("heart-rate-link-{}-{}.json", name, std::process::id()))
    }

    #[tokio::test]
    async fn empty_file_reads_as_default_and_saves_round_trip() {
        let path = scratch_path("io");
        let _ = std::fs::remove_file(&path);
        let config_io = ConfigIO::open(&path).unwrap();

        assert_eq!(config_io.read().await.unwrap(), Config::default());

        let config = Config { device_name: Some("HRM-Dual".to_string()), ..Config::default() };
        config_io.save(&config).await.unwrap();
        assert_eq!(config_io.read().await.unwrap(), config);

        std::fs::remove_file(&path).unwrap();
    }
}
