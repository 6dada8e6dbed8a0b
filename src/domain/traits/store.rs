use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::application::errors::StorageError;
use crate::domain::entities::{ChannelPolicy, PermissionLevel};

/// Durable identity settings, rewritten wholesale on every change
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub owner_verified: bool,
    pub owner_passphrase_hash: Option<String>,
    pub owner_hostmask: Option<String>,
    pub hostmask_levels: Vec<HostmaskLevel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HostmaskLevel {
    pub hostmask: String,
    pub level: PermissionLevel,
}

/// Channel policies, stored apart from the identity settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub channels: BTreeMap<String, ChannelPolicy>,
}

/// Store trait - abstraction for settings persistence
pub trait SettingsStore: Send + Sync {
    /// Missing records load as defaults
    fn load_settings(&self) -> Result<Settings, StorageError>;
    fn save_settings(&self, settings: &Settings) -> Result<(), StorageError>;

    fn load_channels(&self) -> Result<ChannelSettings, StorageError>;
    fn save_channels(&self, channels: &ChannelSettings) -> Result<(), StorageError>;
}
