//! Runtime module management

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Command, CommandContext, CommandRegistry};
use crate::application::errors::CommandError;
use crate::domain::entities::PermissionLevel;
use crate::infrastructure::plugins::manifest::alias_path;
use crate::infrastructure::plugins::{ArtifactName, LoadOutcome};

pub fn register(registry: &mut CommandRegistry) {
    registry.register(
        Command::new("load")
            .with_description("Load or upgrade a module from the module directory")
            .with_usage("load <name>")
            .with_level(PermissionLevel::Owner)
            .with_handler(load),
    );

    registry.register(
        Command::new("unload")
            .with_description("Unload a module")
            .with_usage("unload <name>")
            .with_level(PermissionLevel::Owner)
            .with_handler(unload),
    );

    registry.register(
        Command::new("reload")
            .with_description("Unload every module and rescan the module directory")
            .with_level(PermissionLevel::Owner)
            .with_handler(reload),
    );

    registry.register(
        Command::new("plugins")
            .with_description("List available and loaded modules")
            .with_aliases(vec!["modules".to_string()])
            .with_level(PermissionLevel::Admin)
            .with_handler(plugins),
    );

    registry.register(
        Command::new("load-online")
            .with_description("Download a prebuilt module and load it")
            .with_usage("load-online <url>")
            .with_level(PermissionLevel::Owner)
            .with_handler(load_online),
    );
}

pub fn describe_outcome(outcome: &LoadOutcome) -> String {
    match outcome {
        LoadOutcome::Loaded { name, version } => {
            format!("Module {} version {} loaded", name, version)
        }
        LoadOutcome::AlreadyLoaded { name, version } => {
            format!("Module {} version {} is already loaded", name, version)
        }
        LoadOutcome::Replaced { name, previous, version } => {
            format!("Module {} updated from version {} to {}", name, previous, version)
        }
    }
}

fn required_arg<'a>(ctx: &CommandContext<'a>, usage: &str) -> Result<&'a str, CommandError> {
    ctx.arg(0)
        .ok_or_else(|| CommandError::InvalidArgs(format!("Usage: {}", ctx.prefixed(usage))))
}

fn load(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let name = required_arg(ctx, "load <name>")?;
    if name.contains('/') || name.contains('\\') || name.starts_with('.') {
        return Err(CommandError::InvalidArgs(format!("Invalid module name: {}", name)));
    }
    let path = alias_path(&ctx.services.module_dir, name);
    let outcome = ctx.services.modules.load(&path)?;
    Ok(describe_outcome(&outcome))
}

fn unload(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let name = required_arg(ctx, "unload <name>")?;
    let version = ctx.services.modules.unload(name)?;
    Ok(format!("Module {} version {} unloaded", name, version))
}

fn reload(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let count = ctx.services.modules.reload_all(&ctx.services.module_dir)?;
    Ok(format!("Reloaded {} modules", count))
}

#[derive(Default)]
struct Available {
    alias: bool,
    versions: Vec<String>,
}

fn plugins(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let dir = &ctx.services.module_dir;
    let mut available: BTreeMap<String, Available> = BTreeMap::new();
    let entries = std::fs::read_dir(dir).map_err(|e| {
        CommandError::ExecutionFailed(format!("Cannot read module directory {}: {}", dir.display(), e))
    })?;
    for entry in entries.flatten() {
        let Some(artifact) = ArtifactName::from_path(&entry.path()) else {
            continue;
        };
        let slot = available.entry(artifact.base).or_default();
        match artifact.version {
            Some(version) => slot.versions.push(version),
            None => slot.alias = true,
        }
    }

    let loaded: BTreeMap<String, _> = ctx
        .services
        .modules
        .list()
        .into_iter()
        .map(|info| (info.name.clone(), info))
        .collect();

    let mut names: Vec<&String> = available.keys().chain(loaded.keys()).collect();
    names.sort();
    names.dedup();

    if names.is_empty() {
        return Ok(format!("No modules found in {}", dir.display()));
    }

    let mut reply = format!("Modules in {}:", dir.display());
    for name in names {
        let status = match loaded.get(name) {
            Some(info) => format!(
                "loaded, version {} since {}",
                info.version,
                info.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => "not loaded".to_string(),
        };
        let files = match available.get(name) {
            Some(found) if !found.versions.is_empty() => {
                let mut versions = found.versions.clone();
                versions.sort();
                format!(" [available: {}]", versions.join(", "))
            }
            Some(found) if found.alias => String::new(),
            _ => " [file missing]".to_string(),
        };
        reply.push_str(&format!("\n  {}: {}{}", name, status, files));
    }
    Ok(reply)
}

fn load_online(ctx: &CommandContext<'_>) -> Result<String, CommandError> {
    let url = required_arg(ctx, "load-online <url>")?;
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(CommandError::InvalidArgs("URL must start with http:// or https://".to_string()));
    }
    let installer = ctx
        .services
        .installer
        .clone()
        .ok_or_else(|| CommandError::ExecutionFailed("Remote module loading is not available".to_string()))?;
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| CommandError::ExecutionFailed(format!("Cannot start download: {}", e)))?;

    let client = Arc::clone(ctx.client);
    let reply_to = ctx.reply_to.to_string();
    let download_url = url.to_string();
    runtime.spawn(async move {
        let reply = match installer.install_from_url(&download_url).await {
            Ok(outcome) => describe_outcome(&outcome),
            Err(e) => {
                tracing::error!("Remote load of {} failed: {}", download_url, e);
                format!("Failed to load module from {}: {}", download_url, e)
            }
        };
        if let Err(e) = client.privmsg(&reply_to, &reply) {
            tracing::warn!("Could not report remote load result: {}", e);
        }
    });

    Ok(format!("Downloading module from {}...", url))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{Fixture, OWNER};
    use super::*;
    use crate::application::errors::ModuleError;
    use crate::infrastructure::plugins::manifest::{alias_file_name, versioned_file_name};
    use crate::test_support::ScriptedModule;

    fn touch(fixture: &Fixture, file: &str) {
        std::fs::write(fixture.module_dir.path().join(file), b"").unwrap();
    }

    #[test]
    fn load_resolves_alias_and_reports_swaps() {
        let fixture = Fixture::new();
        fixture.loader.add(&alias_file_name("greeter"), ScriptedModule::new("greeter", "1.0"));

        assert_eq!(
            fixture.run(OWNER, None, "load greeter").unwrap(),
            "Module greeter version 1.0 loaded"
        );
        assert_eq!(
            fixture.run(OWNER, None, "load greeter").unwrap(),
            "Module greeter version 1.0 is already loaded"
        );

        fixture.loader.add(&alias_file_name("greeter"), ScriptedModule::new("greeter", "1.1"));
        assert_eq!(
            fixture.run(OWNER, None, "load greeter").unwrap(),
            "Module greeter updated from version 1.0 to 1.1"
        );
    }

    #[test]
    fn load_errors_are_reported() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.run(OWNER, None, "load ghost"),
            Err(CommandError::Module(ModuleError::Open { .. }))
        ));
        assert!(matches!(
            fixture.run(OWNER, None, "load ../etc/evil"),
            Err(CommandError::InvalidArgs(_))
        ));
        assert!(matches!(fixture.run(OWNER, None, "load"), Err(CommandError::InvalidArgs(_))));
    }

    #[test]
    fn unload_and_reload() {
        let fixture = Fixture::new();
        let alias = alias_file_name("greeter");
        touch(&fixture, &alias);
        fixture.loader.add(&alias, ScriptedModule::new("greeter", "1.0"));
        fixture.run(OWNER, None, "load greeter").unwrap();

        assert_eq!(fixture.run(OWNER, None, "reload").unwrap(), "Reloaded 1 modules");
        assert_eq!(
            fixture.run(OWNER, None, "unload greeter").unwrap(),
            "Module greeter version 1.0 unloaded"
        );
        let err = fixture.run(OWNER, None, "unload greeter").unwrap_err();
        assert_eq!(err.to_string(), "Module greeter is not loaded");
    }

    #[test]
    fn plugins_collapses_versions_onto_base_name() {
        let fixture = Fixture::new();
        touch(&fixture, &alias_file_name("greeter"));
        touch(&fixture, &versioned_file_name("greeter", "1.0"));
        touch(&fixture, &versioned_file_name("greeter", "1.1"));
        touch(&fixture, &versioned_file_name("dice", "0.2"));
        touch(&fixture, "README.md");
        fixture.loader.add(&alias_file_name("greeter"), ScriptedModule::new("greeter", "1.1"));
        fixture.run(OWNER, None, "load greeter").unwrap();

        let listing = fixture.run(OWNER, None, "plugins").unwrap();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "  dice: not loaded [available: 0.2]");
        assert!(lines[2].starts_with("  greeter: loaded, version 1.1 since "));
        assert!(lines[2].ends_with("[available: 1.0, 1.1]"));
    }

    #[test]
    fn plugins_reports_empty_directory() {
        let fixture = Fixture::new();
        let reply = fixture.run(OWNER, None, "modules").unwrap();
        assert!(reply.starts_with("No modules found in "));
    }

    #[test]
    fn load_online_validates_before_spawning() {
        let fixture = Fixture::new();
        assert!(matches!(
            fixture.run(OWNER, None, "load-online ftp://example.org/m.so"),
            Err(CommandError::InvalidArgs(_))
        ));
        assert!(matches!(
            fixture.run(OWNER, None, "load-online https://example.org/m.so"),
            Err(CommandError::ExecutionFailed(_))
        ));
    }
}
