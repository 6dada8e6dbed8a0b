//! Permission resolver - Hostmask to level lookup with owner binding

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::application::errors::StorageError;
use crate::domain::entities::{nick_of, wildcard_hostmask, PermissionLevel};
use crate::domain::traits::{HostmaskLevel, Settings, SettingsStore};

#[derive(Debug, Default)]
struct IdentityState {
    levels: HashMap<String, PermissionLevel>,
    owner_verified: bool,
    owner_hostmask: Option<String>,
    owner_passphrase_hash: Option<String>,
}

impl IdentityState {
    fn from_settings(settings: Settings) -> Self {
        let mut levels: HashMap<String, PermissionLevel> = settings
            .hostmask_levels
            .into_iter()
            .map(|entry| (entry.hostmask, entry.level))
            .collect();
        if settings.owner_verified {
            if let Some(owner) = &settings.owner_hostmask {
                levels.entry(owner.clone()).or_insert(PermissionLevel::Owner);
            }
        }
        Self {
            levels,
            owner_verified: settings.owner_verified,
            owner_hostmask: settings.owner_hostmask,
            owner_passphrase_hash: settings.owner_passphrase_hash,
        }
    }

    fn to_settings(&self) -> Settings {
        let mut hostmask_levels: Vec<HostmaskLevel> = self
            .levels
            .iter()
            .map(|(hostmask, level)| HostmaskLevel {
                hostmask: hostmask.clone(),
                level: *level,
            })
            .collect();
        hostmask_levels.sort_by(|a, b| a.hostmask.cmp(&b.hostmask));

        Settings {
            owner_verified: self.owner_verified,
            owner_passphrase_hash: self.owner_passphrase_hash.clone(),
            owner_hostmask: self.owner_hostmask.clone(),
            hostmask_levels,
        }
    }

    fn is_verified_owner(&self, hostmask: &str) -> bool {
        self.owner_verified && self.owner_hostmask.as_deref() == Some(hostmask)
    }

    /// Records registered under `nick!`, compared case-insensitively
    fn records_for_nick<'a>(&'a self, nick: &'a str) -> impl Iterator<Item = (&'a String, &'a PermissionLevel)> + 'a {
        self.levels
            .iter()
            .filter(move |(hostmask, _)| hostmask.contains('!') && nick_of(hostmask).eq_ignore_ascii_case(nick))
    }

    fn level_of(&self, hostmask: &str) -> PermissionLevel {
        if let Some(level) = self.levels.get(hostmask) {
            return *level;
        }
        if self.is_verified_owner(hostmask) {
            return PermissionLevel::Owner;
        }
        let wildcard = wildcard_hostmask(nick_of(hostmask));
        self.levels
            .iter()
            .filter(|(record, _)| record.eq_ignore_ascii_case(&wildcard))
            .map(|(_, level)| *level)
            .max()
            .unwrap_or_default()
    }
}

/// Outcome of a nick-targeted level change
#[derive(Debug, Clone, PartialEq)]
pub struct NickLevelChange {
    pub previous: PermissionLevel,
    pub updated: Vec<String>,
    /// True when no hostmask was known and only the wildcard record was written
    pub wildcard_only: bool,
}

/// Resolves sender hostmasks to permission levels.
///
/// Lookup order: exact hostmask record, then the verified owner hostmask, then
/// the `nick!*@*` wildcard record for the sender's nick, then Regular.
pub struct PermissionResolver {
    state: RwLock<IdentityState>,
    store: Arc<dyn SettingsStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<dyn SettingsStore>) -> Result<Self, StorageError> {
        let settings = store.load_settings()?;
        tracing::info!(
            records = settings.hostmask_levels.len(),
            owner_verified = settings.owner_verified,
            "Loaded identity settings"
        );
        Ok(Self {
            state: RwLock::new(IdentityState::from_settings(settings)),
            store,
        })
    }

    pub fn level_of(&self, hostmask: &str) -> PermissionLevel {
        match self.state.read() {
            Ok(state) => state.level_of(hostmask),
            Err(poisoned) => poisoned.into_inner().level_of(hostmask),
        }
    }

    /// Ignored never passes. Owner additionally needs the verified owner hostmask.
    pub fn has_permission(&self, hostmask: &str, required: PermissionLevel) -> bool {
        let state = match self.state.read() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let level = state.level_of(hostmask);
        if level == PermissionLevel::Ignored {
            return false;
        }
        if required == PermissionLevel::Owner {
            return state.is_verified_owner(hostmask);
        }
        level >= required
    }

    pub fn is_verified_owner(&self, hostmask: &str) -> bool {
        self.read().map(|s| s.is_verified_owner(hostmask)).unwrap_or(false)
    }

    pub fn owner_verified(&self) -> bool {
        self.read().map(|s| s.owner_verified).unwrap_or(false)
    }

    pub fn owner_hostmask(&self) -> Option<String> {
        self.read().ok().and_then(|s| s.owner_hostmask.clone())
    }

    /// Highest level recorded for any hostmask of `nick`, Regular if none
    pub fn nick_level(&self, nick: &str) -> PermissionLevel {
        self.read()
            .ok()
            .and_then(|s| s.records_for_nick(nick).map(|(_, level)| *level).max())
            .unwrap_or_default()
    }

    pub fn hostmasks(&self) -> BTreeMap<String, PermissionLevel> {
        self.read()
            .map(|s| s.levels.iter().map(|(h, l)| (h.clone(), *l)).collect())
            .unwrap_or_default()
    }

    /// Set one exact hostmask. The in-memory change stays even if persisting fails.
    pub fn set_level(&self, hostmask: &str, level: PermissionLevel) -> Result<(), StorageError> {
        let mut state = self.write()?;
        state.levels.insert(hostmask.to_string(), level);
        tracing::info!(hostmask, %level, "Permission level set");
        self.store.save_settings(&state.to_settings())
    }

    /// Set every known hostmask of `nick` plus its wildcard record.
    pub fn set_level_by_nick(&self, nick: &str, level: PermissionLevel) -> Result<NickLevelChange, StorageError> {
        let mut state = self.write()?;
        let wildcard = wildcard_hostmask(nick);

        let previous = state
            .records_for_nick(nick)
            .map(|(_, l)| *l)
            .max()
            .unwrap_or_default();
        let mut updated: Vec<String> = state
            .records_for_nick(nick)
            .map(|(h, _)| h.clone())
            .filter(|h| !h.eq_ignore_ascii_case(&wildcard))
            .collect();
        updated.sort();
        let wildcard_only = updated.is_empty();

        for hostmask in &updated {
            state.levels.insert(hostmask.clone(), level);
        }
        let existing_wildcard = state
            .levels
            .keys()
            .find(|h| h.eq_ignore_ascii_case(&wildcard))
            .cloned()
            .unwrap_or(wildcard);
        state.levels.insert(existing_wildcard, level);

        tracing::info!(nick, %level, hostmasks = updated.len(), "Permission level set by nick");
        self.store.save_settings(&state.to_settings())?;

        Ok(NickLevelChange {
            previous,
            updated,
            wildcard_only,
        })
    }

    /// Bind the verified owner, replacing any previous owner record.
    /// Memory changes only after the record is durable.
    pub fn record_owner(&self, hostmask: &str, passphrase_hash: &str) -> Result<(), StorageError> {
        let mut state = self.write()?;
        let mut next = state.to_settings();
        if let Some(previous) = next.owner_hostmask.take().filter(|p| p != hostmask) {
            next.hostmask_levels
                .retain(|entry| !(entry.hostmask == previous && entry.level == PermissionLevel::Owner));
            tracing::info!(%previous, "Previous owner hostmask released");
        }
        next.owner_verified = true;
        next.owner_hostmask = Some(hostmask.to_string());
        next.owner_passphrase_hash = Some(passphrase_hash.to_string());
        next.hostmask_levels.retain(|entry| entry.hostmask != hostmask);
        next.hostmask_levels.push(HostmaskLevel {
            hostmask: hostmask.to_string(),
            level: PermissionLevel::Owner,
        });
        next.hostmask_levels.sort_by(|a, b| a.hostmask.cmp(&b.hostmask));

        self.store.save_settings(&next)?;
        *state = IdentityState::from_settings(next);
        tracing::info!(hostmask, "Owner hostmask recorded");
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, IdentityState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::Poisoned("identity state".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, IdentityState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::Poisoned("identity state".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryStore;

    fn resolver_with(settings: Settings) -> (PermissionResolver, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_settings(settings));
        let resolver = PermissionResolver::new(store.clone()).unwrap();
        (resolver, store)
    }

    fn record(hostmask: &str, level: PermissionLevel) -> HostmaskLevel {
        HostmaskLevel {
            hostmask: hostmask.to_string(),
            level,
        }
    }

    #[test]
    fn unknown_sender_is_regular() {
        let (resolver, _) = resolver_with(Settings::default());
        assert_eq!(resolver.level_of("eve!e@host"), PermissionLevel::Regular);
    }

    #[test]
    fn exact_record_beats_wildcard() {
        let (resolver, _) = resolver_with(Settings {
            hostmask_levels: vec![
                record("bob!*@*", PermissionLevel::Admin),
                record("bob!b@home", PermissionLevel::BadBoy),
            ],
            ..Default::default()
        });
        assert_eq!(resolver.level_of("bob!b@home"), PermissionLevel::BadBoy);
        assert_eq!(resolver.level_of("BOB!x@elsewhere"), PermissionLevel::Admin);
    }

    #[test]
    fn exact_records_do_not_leak_to_other_hosts() {
        let (resolver, _) = resolver_with(Settings {
            hostmask_levels: vec![record("bob!b@home", PermissionLevel::Admin)],
            ..Default::default()
        });
        assert_eq!(resolver.level_of("bob!b@spoofed"), PermissionLevel::Regular);
    }

    #[test]
    fn owner_requires_exact_verified_hostmask() {
        let (resolver, _) = resolver_with(Settings {
            owner_verified: true,
            owner_hostmask: Some("alice!a@home".into()),
            hostmask_levels: vec![record("alice!*@*", PermissionLevel::Owner)],
            ..Default::default()
        });
        assert!(resolver.has_permission("alice!a@home", PermissionLevel::Owner));
        assert_eq!(resolver.level_of("alice!a@other"), PermissionLevel::Owner);
        assert!(!resolver.has_permission("alice!a@other", PermissionLevel::Owner));
        assert!(resolver.has_permission("alice!a@other", PermissionLevel::Admin));
    }

    #[test]
    fn nobody_is_owner_without_verification() {
        let (resolver, _) = resolver_with(Settings {
            hostmask_levels: vec![record("alice!a@home", PermissionLevel::Owner)],
            ..Default::default()
        });
        assert!(!resolver.has_permission("alice!a@home", PermissionLevel::Owner));
        assert!(resolver.has_permission("alice!a@home", PermissionLevel::Admin));
    }

    #[test]
    fn ignored_fails_every_check() {
        let (resolver, _) = resolver_with(Settings {
            hostmask_levels: vec![record("troll!t@x", PermissionLevel::Ignored)],
            ..Default::default()
        });
        for level in PermissionLevel::ALL {
            assert!(!resolver.has_permission("troll!t@x", level));
        }
    }

    #[test]
    fn set_level_persists_wholesale() {
        let (resolver, store) = resolver_with(Settings::default());
        resolver.set_level("carol!c@h", PermissionLevel::Admin).unwrap();
        let saved = store.settings();
        assert_eq!(saved.hostmask_levels, vec![record("carol!c@h", PermissionLevel::Admin)]);
    }

    #[test]
    fn set_level_by_nick_updates_known_hosts_and_wildcard() {
        let (resolver, store) = resolver_with(Settings {
            hostmask_levels: vec![
                record("dave!d@one", PermissionLevel::Admin),
                record("dave!d@two", PermissionLevel::Regular),
                record("erin!e@one", PermissionLevel::Admin),
            ],
            ..Default::default()
        });
        let change = resolver.set_level_by_nick("dave", PermissionLevel::BadBoy).unwrap();
        assert_eq!(change.previous, PermissionLevel::Admin);
        assert_eq!(change.updated, vec!["dave!d@one", "dave!d@two"]);
        assert!(!change.wildcard_only);

        assert_eq!(resolver.level_of("dave!d@three"), PermissionLevel::BadBoy);
        assert_eq!(resolver.level_of("erin!e@one"), PermissionLevel::Admin);
        assert_eq!(store.settings().hostmask_levels.len(), 4);
    }

    #[test]
    fn set_level_by_unknown_nick_writes_wildcard() {
        let (resolver, _) = resolver_with(Settings::default());
        let change = resolver.set_level_by_nick("frank", PermissionLevel::Ignored).unwrap();
        assert!(change.wildcard_only);
        assert_eq!(change.previous, PermissionLevel::Regular);
        assert_eq!(resolver.hostmasks().into_keys().collect::<Vec<_>>(), vec!["frank!*@*"]);
        assert!(!resolver.has_permission("frank!f@anywhere", PermissionLevel::BadBoy));
    }

    #[test]
    fn persist_failure_keeps_memory_for_set_level() {
        let (resolver, store) = resolver_with(Settings::default());
        store.fail_writes(true);
        assert!(resolver.set_level("gina!g@h", PermissionLevel::Admin).is_err());
        assert_eq!(resolver.level_of("gina!g@h"), PermissionLevel::Admin);
    }

    #[test]
    fn owner_record_is_not_applied_when_persist_fails() {
        let (resolver, store) = resolver_with(Settings::default());
        store.fail_writes(true);
        assert!(resolver.record_owner("alice!a@home", "$argon2id$fake").is_err());
        assert!(!resolver.owner_verified());

        store.fail_writes(false);
        resolver.record_owner("alice!a@home", "$argon2id$fake").unwrap();
        assert!(resolver.is_verified_owner("alice!a@home"));
        let saved = store.settings();
        assert!(saved.owner_verified);
        assert_eq!(saved.owner_hostmask.as_deref(), Some("alice!a@home"));
        assert_eq!(saved.hostmask_levels, vec![record("alice!a@home", PermissionLevel::Owner)]);
    }

    #[test]
    fn new_owner_replaces_the_old_owner_record() {
        let (resolver, store) = resolver_with(Settings {
            owner_verified: true,
            owner_hostmask: Some("alice!a@home".into()),
            hostmask_levels: vec![
                record("alice!a@home", PermissionLevel::Owner),
                record("bob!b@work", PermissionLevel::Admin),
            ],
            ..Default::default()
        });

        resolver.record_owner("alice!a@laptop", "$argon2id$fake").unwrap();

        assert!(resolver.is_verified_owner("alice!a@laptop"));
        assert_eq!(resolver.level_of("alice!a@home"), PermissionLevel::Regular);
        assert!(!resolver.has_permission("alice!a@home", PermissionLevel::Admin));
        assert_eq!(
            store.settings().hostmask_levels,
            vec![
                record("alice!a@laptop", PermissionLevel::Owner),
                record("bob!b@work", PermissionLevel::Admin),
            ]
        );
    }
}
