//! Channel policies - Per-channel allow and deny lists, loaded from and saved to the store

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::application::errors::StorageError;
use crate::domain::entities::{normalize_channel, ChannelPolicy};
use crate::domain::traits::{ChannelSettings, SettingsStore};

/// Per-channel command policies, persisted apart from identity settings
pub struct ChannelPolicies {
    policies: RwLock<BTreeMap<String, ChannelPolicy>>,
    store: Arc<dyn SettingsStore>,
}

impl ChannelPolicies {
    pub fn new(store: Arc<dyn SettingsStore>) -> Result<Self, StorageError> {
        let loaded = store.load_channels()?;
        tracing::info!(channels = loaded.channels.len(), "Loaded channel settings");
        Ok(Self {
            policies: RwLock::new(loaded.channels),
            store,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ChannelPolicy>> {
        self.policies.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ChannelPolicy>> {
        self.policies.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Channels without a policy allow everything.
    pub fn allows(&self, channel: &str, command: &str) -> bool {
        self.read()
            .get(&normalize_channel(channel))
            .map(|policy| policy.allows(command))
            .unwrap_or(true)
    }

    pub fn get(&self, channel: &str) -> Option<ChannelPolicy> {
        self.read().get(&normalize_channel(channel)).cloned()
    }

    pub fn channels(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn enable(&self, channel: &str, command: &str) -> Result<(), StorageError> {
        self.update(channel, |policy| policy.enable(command))
    }

    pub fn disable(&self, channel: &str, command: &str) -> Result<(), StorageError> {
        self.update(channel, |policy| policy.disable(command))
    }

    pub fn set(&self, channel: &str, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(channel, |policy| policy.set(key, value))
    }

    /// Write the current policies to the store
    pub fn save(&self) -> Result<(), StorageError> {
        let snapshot = ChannelSettings {
            channels: self.read().clone(),
        };
        self.store.save_channels(&snapshot)
    }

    fn update<F: FnOnce(&mut ChannelPolicy)>(&self, channel: &str, apply: F) -> Result<(), StorageError> {
        let channel = normalize_channel(channel);
        let snapshot = {
            let mut policies = self.write();
            apply(policies.entry(channel.clone()).or_default());
            ChannelSettings {
                channels: policies.clone(),
            }
        };
        tracing::info!(channel = %channel, "Channel policy updated");
        self.store.save_channels(&snapshot)
    }
}
