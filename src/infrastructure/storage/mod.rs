//! File-based storage implementation

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::traits::{ChannelSettings, Settings, SettingsStore};

/// YAML file-based store. Each record lives in its own file and is rewritten wholesale.
pub struct YamlStore {
    settings_path: PathBuf,
    channels_path: PathBuf,
}

impl YamlStore {
    pub fn new(settings_path: impl Into<PathBuf>, channels_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
            channels_path: channels_path.into(),
        }
    }

    fn load<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StorageError> {
        if !path.exists() {
            tracing::debug!("{} not found, using defaults", path.display());
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(T::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write to a sibling temp file first so a crash never leaves a half-written record.
    fn save<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(value)?;
        let tmp = path.with_extension("yaml.tmp");
        std::fs::write(&tmp, yaml)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl SettingsStore for YamlStore {
    fn load_settings(&self) -> Result<Settings, StorageError> {
        Self::load(&self.settings_path)
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        Self::save(&self.settings_path, settings)
    }

    fn load_channels(&self) -> Result<ChannelSettings, StorageError> {
        Self::load(&self.channels_path)
    }

    fn save_channels(&self, channels: &ChannelSettings) -> Result<(), StorageError> {
        Self::save(&self.channels_path, channels)
    }
}

/// In-memory store for tests
#[derive(Default)]
pub struct MemoryStore {
    settings: Mutex<Settings>,
    channels: Mutex<ChannelSettings>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            ..Default::default()
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn channels(&self) -> ChannelSettings {
        self.channels.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Make every save fail, to exercise error paths
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "store is read-only",
            )));
        }
        Ok(())
    }
}

impl SettingsStore for MemoryStore {
    fn load_settings(&self) -> Result<Settings, StorageError> {
        Ok(self.settings())
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut current = self
            .settings
            .lock()
            .map_err(|_| StorageError::Poisoned("settings".to_string()))?;
        *current = settings.clone();
        Ok(())
    }

    fn load_channels(&self) -> Result<ChannelSettings, StorageError> {
        Ok(self.channels())
    }

    fn save_channels(&self, channels: &ChannelSettings) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut current = self
            .channels
            .lock()
            .map_err(|_| StorageError::Poisoned("channels".to_string()))?;
        *current = channels.clone();
        Ok(())
    }
}
