//! Module registry - Manages loaded modules, versions and hot swaps

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::loader::{LoadedModule, ModuleLoader};
use super::manifest::ArtifactName;
use crate::application::errors::ModuleError;
use crate::domain::entities::Message;
use crate::domain::traits::Client;
use crate::plugins::{Capability, Module};

/// A registered module with the metadata cached at load time
pub struct ModuleEntry {
    pub name: String,
    pub version: String,
    pub loaded_at: DateTime<Utc>,
    pub capabilities: BTreeSet<Capability>,
    pub commands: Vec<String>,
    loaded: LoadedModule,
}

impl ModuleEntry {
    pub fn module(&self) -> &dyn Module {
        self.loaded.module()
    }

    pub fn path(&self) -> &Path {
        self.loaded.path()
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Declared spelling of `command`, if this module serves it
    fn serves(&self, command: &str) -> Option<&str> {
        if !self.has(Capability::Commands) {
            return None;
        }
        self.commands
            .iter()
            .find(|c| c.eq_ignore_ascii_case(command))
            .map(String::as_str)
    }
}

/// Read-only view of a loaded module
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInfo {
    pub name: String,
    pub version: String,
    pub loaded_at: DateTime<Utc>,
    pub path: PathBuf,
    pub capabilities: Vec<Capability>,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { name: String, version: String },
    /// Same name and version already present; nothing changed
    AlreadyLoaded { name: String, version: String },
    /// An older or newer version was unloaded first
    Replaced { name: String, previous: String, version: String },
}

impl LoadOutcome {
    pub fn name(&self) -> &str {
        match self {
            LoadOutcome::Loaded { name, .. }
            | LoadOutcome::AlreadyLoaded { name, .. }
            | LoadOutcome::Replaced { name, .. } => name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            LoadOutcome::Loaded { version, .. }
            | LoadOutcome::AlreadyLoaded { version, .. }
            | LoadOutcome::Replaced { version, .. } => version,
        }
    }
}

/// Registry for managing loaded modules
pub struct ModuleRegistry {
    loader: Arc<dyn ModuleLoader>,
    modules: RwLock<BTreeMap<String, Arc<ModuleEntry>>>,
}

fn call_unload(entry: &ModuleEntry) {
    if let Err(e) = entry.module().on_unload() {
        tracing::error!("on_unload error for module {}: {}", entry.name, e);
    }
}

/// Compare dotted versions numerically, falling back to text order
fn version_key(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.parse::<u64>().unwrap_or(0))
        .collect()
}

impl ModuleRegistry {
    pub fn new(loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            modules: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<ModuleEntry>>> {
        self.modules.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<ModuleEntry>>> {
        self.modules.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load one artifact.
    ///
    /// Opening and contract checks happen before anything registered is touched,
    /// so those failures leave the current version in place.
    pub fn load(&self, path: &Path) -> Result<LoadOutcome, ModuleError> {
        let opened = self.loader.open(path)?;

        let name = opened.module().name().trim().to_string();
        let version = opened.module().version().trim().to_string();
        if name.is_empty() {
            return Err(ModuleError::Contract(format!("{} reports an empty name", path.display())));
        }
        if version.is_empty() {
            return Err(ModuleError::Contract(format!("module {} reports an empty version", name)));
        }

        let capabilities: BTreeSet<Capability> = opened.module().capabilities().into_iter().collect();
        let commands = if capabilities.contains(&Capability::Commands) {
            let commands = opened.module().commands();
            if commands.is_empty() {
                tracing::warn!("Module {} declares command handling but no commands", name);
            }
            commands
        } else {
            Vec::new()
        };

        let mut modules = self.write();

        let mut previous = None;
        if let Some(existing) = modules.get(&name) {
            if existing.version == version {
                tracing::info!("Module {} version {} is already loaded", name, version);
                return Ok(LoadOutcome::AlreadyLoaded { name, version });
            }
            call_unload(existing);
            tracing::info!(
                "Unloaded previous version of module {} (was {}, loading {})",
                name,
                existing.version,
                version
            );
            previous = Some(existing.version.clone());
            modules.remove(&name);
        }

        opened.module().on_load().map_err(|reason| ModuleError::LoadHook {
            name: name.clone(),
            reason,
        })?;

        if !commands.is_empty() {
            tracing::info!(
                "Module {} version {} registered commands: {}",
                name,
                version,
                commands.join(", ")
            );
        }
        tracing::info!("Module {} version {} loaded from {}", name, version, path.display());

        modules.insert(
            name.clone(),
            Arc::new(ModuleEntry {
                name: name.clone(),
                version: version.clone(),
                loaded_at: Utc::now(),
                capabilities,
                commands,
                loaded: opened,
            }),
        );

        Ok(match previous {
            Some(previous) => LoadOutcome::Replaced { name, previous, version },
            None => LoadOutcome::Loaded { name, version },
        })
    }

    /// Run the shutdown hook and remove the module. Returns the unloaded version.
    pub fn unload(&self, name: &str) -> Result<String, ModuleError> {
        let mut modules = self.write();
        let entry = modules
            .get(name)
            .cloned()
            .ok_or_else(|| ModuleError::NotLoaded(name.to_string()))?;
        call_unload(&entry);
        modules.remove(name);
        tracing::info!("Module {} version {} unloaded", name, entry.version);
        Ok(entry.version.clone())
    }

    /// Unload everything, then scan `dir` again.
    pub fn reload_all(&self, dir: &Path) -> Result<usize, ModuleError> {
        let drained: Vec<Arc<ModuleEntry>> = {
            let mut modules = self.write();
            let drained: Vec<Arc<ModuleEntry>> = modules.values().cloned().collect();
            for entry in &drained {
                call_unload(entry);
                tracing::info!("Module {} version {} unloaded", entry.name, entry.version);
            }
            modules.clear();
            drained
        };
        tracing::info!("Unloaded {} modules", drained.len());
        drop(drained);

        self.scan_directory(dir)
    }

    /// Load each logical artifact in `dir` once.
    ///
    /// The `<name>.<ext>` alias is preferred; without one the highest
    /// `<name>_v<version>.<ext>` wins. Individual failures are logged and skipped.
    pub fn scan_directory(&self, dir: &Path) -> Result<usize, ModuleError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ModuleError::Directory {
            path: dir.display().to_string(),
            source,
        })?;

        let mut candidates: BTreeMap<String, (Option<PathBuf>, Vec<(String, PathBuf)>)> = BTreeMap::new();
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let Some(artifact) = ArtifactName::from_path(&path) else {
                continue;
            };
            let slot = candidates.entry(artifact.base).or_default();
            match artifact.version {
                Some(version) => slot.1.push((version, path)),
                None => slot.0 = Some(path),
            }
        }

        let mut loaded = 0;
        for (base, (alias, mut versioned)) in candidates {
            versioned.sort_by(|a, b| version_key(&a.0).cmp(&version_key(&b.0)).then(a.0.cmp(&b.0)));
            let Some(path) = alias.or_else(|| versioned.pop().map(|(_, p)| p)) else {
                continue;
            };
            match self.load(&path) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::error!("Error loading module {}: {}", base, e),
            }
        }
        Ok(loaded)
    }

    /// Loaded modules sorted by name
    pub fn list(&self) -> Vec<ModuleInfo> {
        self.read()
            .values()
            .map(|entry| ModuleInfo {
                name: entry.name.clone(),
                version: entry.version.clone(),
                loaded_at: entry.loaded_at,
                path: entry.path().to_path_buf(),
                capabilities: entry.capabilities.iter().copied().collect(),
                commands: entry.commands.clone(),
            })
            .collect()
    }

    pub fn version_of(&self, name: &str) -> Option<String> {
        self.read().get(name).map(|e| e.version.clone())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Clone out the current modules so handlers run without holding the lock
    pub fn snapshot(&self) -> Vec<Arc<ModuleEntry>> {
        self.read().values().cloned().collect()
    }

    /// Offer a command to command-capable modules. The first one serving it wins.
    pub fn handle_command(&self, client: &dyn Client, msg: &Message, command: &str, args: &[String]) -> bool {
        let handler = self
            .read()
            .values()
            .find(|entry| entry.serves(command).is_some())
            .cloned();
        let Some(entry) = handler else {
            return false;
        };
        let declared = entry.serves(command).unwrap_or(command);
        tracing::debug!("Command {} handled by module {}", declared, entry.name);
        entry.module().handle_command(client, msg, declared, args);
        true
    }

    /// `(module, commands)` for every module that serves commands
    pub fn module_commands(&self) -> Vec<(String, Vec<String>)> {
        self.read()
            .values()
            .filter(|e| e.has(Capability::Commands) && !e.commands.is_empty())
            .map(|e| (e.name.clone(), e.commands.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::plugins::manifest::{alias_file_name, versioned_file_name};
    use crate::test_support::{RecordingClient, ScriptedLoader, ScriptedModule};

    fn registry(loader: &Arc<ScriptedLoader>) -> ModuleRegistry {
        ModuleRegistry::new(loader.clone())
    }

    #[test]
    fn loads_and_lists_module() {
        let loader = Arc::new(ScriptedLoader::default());
        loader.add("greeter.so", ScriptedModule::new("greeter", "1.0").with_capabilities(&[Capability::Join]));
        let registry = registry(&loader);

        let outcome = registry.load(Path::new("greeter.so")).unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Loaded { name: "greeter".into(), version: "1.0".into() }
        );
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].capabilities, vec![Capability::Join]);
        assert_eq!(loader.events(), vec!["load greeter 1.0"]);
    }

    #[test]
    fn same_version_reload_is_a_no_op() {
        let loader = Arc::new(ScriptedLoader::default());
        loader.add("greeter.so", ScriptedModule::new("greeter", "1.0"));
        let registry = registry(&loader);

        registry.load(Path::new("greeter.so")).unwrap();
        let loaded_at = registry.list()[0].loaded_at;
        let outcome = registry.load(Path::new("greeter.so")).unwrap();

        assert!(matches!(outcome, LoadOutcome::AlreadyLoaded { .. }));
        assert_eq!(registry.list()[0].loaded_at, loaded_at);
        assert_eq!(loader.events(), vec!["load greeter 1.0"]);
    }

    #[test]
    fn version_swap_unloads_old_exactly_once_first() {
        let loader = Arc::new(ScriptedLoader::default());
        loader.add("greeter_v1.0.so", ScriptedModule::new("greeter", "1.0"));
        loader.add("greeter_v2.0.so", ScriptedModule::new("greeter", "2.0"));
        let registry = registry(&loader);

        registry.load(Path::new("greeter_v1.0.so")).unwrap();
        let outcome = registry.load(Path::new("greeter_v2.0.so")).unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Replaced {
                name: "greeter".into(),
                previous: "1.0".into(),
                version: "2.0".into()
            }
        );
        assert_eq!(
            loader.events(),
            vec!["load greeter 1.0", "unload greeter 1.0", "load greeter 2.0"]
        );
        assert_eq!(registry.version_of("greeter").as_deref(), Some("2.0"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn open_and_contract_failures_keep_previous_module() {
        let loader = Arc::new(ScriptedLoader::default());
        loader.add("greeter.so", ScriptedModule::new("greeter", "1.0"));
        loader.add("broken.so", ScriptedModule::new("greeter", ""));
        let registry = registry(&loader);
        registry.load(Path::new("greeter.so")).unwrap();

        assert!(matches!(
            registry.load(Path::new("missing.so")),
            Err(ModuleError::Open { .. })
        ));
        assert!(matches!(
            registry.load(Path::new("broken.so")),
            Err(ModuleError::Contract(_))
        ));
        assert_eq!(registry.version_of("greeter").as_deref(), Some("1.0"));
        assert_eq!(loader.events(), vec!["load greeter 1.0"]);
    }

    #[test]
    fn failing_load_hook_is_reported() {
        let loader = Arc::new(ScriptedLoader::default());
        loader.add("grumpy.so", ScriptedModule::new("grumpy", "1.0").failing_load());
        let registry = registry(&loader);

        assert!(matches!(
            registry.load(Path::new("grumpy.so")),
            Err(ModuleError::LoadHook { .. })
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn unload_runs_hook_and_tolerates_its_error() {
        let loader = Arc::new(ScriptedLoader::default());
        loader.add("sulky.so", ScriptedModule::new("sulky", "0.3").failing_unload());
        let registry = registry(&loader);
        registry.load(Path::new("sulky.so")).unwrap();

        assert_eq!(registry.unload("sulky").unwrap(), "0.3");
        assert!(!registry.is_loaded("sulky"));
        assert_eq!(loader.events(), vec!["load sulky 0.3", "unload sulky 0.3"]);
        assert!(matches!(registry.unload("sulky"), Err(ModuleError::NotLoaded(_))));
    }

    #[test]
    fn scan_prefers_alias_then_newest_version() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(ScriptedLoader::default());
        let files = [
            (alias_file_name("echo"), ScriptedModule::new("echo", "1.1")),
            (versioned_file_name("echo", "1.0"), ScriptedModule::new("echo", "1.0")),
            (versioned_file_name("echo", "1.1"), ScriptedModule::new("echo", "1.1")),
            (versioned_file_name("topic", "1.9"), ScriptedModule::new("topic", "1.9")),
            (versioned_file_name("topic", "1.10"), ScriptedModule::new("topic", "1.10")),
        ];
        for (file, module) in files {
            std::fs::write(dir.path().join(&file), b"").unwrap();
            loader.add(&file, module);
        }
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let registry = registry(&loader);

        assert_eq!(registry.scan_directory(dir.path()).unwrap(), 2);
        assert_eq!(registry.version_of("echo").as_deref(), Some("1.1"));
        assert_eq!(registry.version_of("topic").as_deref(), Some("1.10"));
        assert_eq!(loader.events(), vec!["load echo 1.1", "load topic 1.10"]);
    }

    #[test]
    fn scan_of_missing_directory_reports_error() {
        let registry = registry(&Arc::new(ScriptedLoader::default()));
        assert!(matches!(
            registry.scan_directory(Path::new("/definitely/not/here")),
            Err(ModuleError::Directory { .. })
        ));
    }

    #[test]
    fn reload_all_unloads_everything_first() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Arc::new(ScriptedLoader::default());
        loader.add("a.so", ScriptedModule::new("a", "1"));
        loader.add("b.so", ScriptedModule::new("b", "1"));
        let registry = registry(&loader);
        registry.load(Path::new("a.so")).unwrap();
        registry.load(Path::new("b.so")).unwrap();

        assert_eq!(registry.reload_all(dir.path()).unwrap(), 0);
        assert!(registry.is_empty());
        assert_eq!(
            loader.events(),
            vec!["load a 1", "load b 1", "unload a 1", "unload b 1"]
        );
    }

    #[test]
    fn first_command_capable_module_wins() {
        let loader = Arc::new(ScriptedLoader::default());
        loader.add(
            "alpha.so",
            ScriptedModule::new("alpha", "1").with_commands(&["roll"]),
        );
        loader.add(
            "beta.so",
            ScriptedModule::new("beta", "1").with_commands(&["roll", "flip"]),
        );
        loader.add(
            "mute.so",
            ScriptedModule::new("mute", "1").with_commands_undeclared(&["hush"]),
        );
        let registry = registry(&loader);
        for file in ["beta.so", "alpha.so", "mute.so"] {
            registry.load(Path::new(file)).unwrap();
        }

        let client = RecordingClient::new("mbot");
        let msg = Message::privmsg("bob!b@h", "#rust", "!roll d20");
        assert!(registry.handle_command(&client, &msg, "roll", &["d20".to_string()]));
        assert!(registry.handle_command(&client, &msg, "FLIP", &[]));
        assert!(!registry.handle_command(&client, &msg, "hush", &[]));
        assert!(!registry.handle_command(&client, &msg, "nothing", &[]));

        let events = loader.events();
        assert!(events.contains(&"command alpha roll d20".to_string()));
        assert!(!events.iter().any(|e| e.starts_with("command beta roll")));
        // Modules get the spelling they declared
        assert!(events.contains(&"command beta flip".to_string()));
        assert_eq!(
            registry.module_commands(),
            vec![
                ("alpha".to_string(), vec!["roll".to_string()]),
                ("beta".to_string(), vec!["roll".to_string(), "flip".to_string()]),
            ]
        );
    }
}
