//! Module loader - Opens shared libraries and resolves the exported module

use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};

use crate::application::errors::ModuleError;
use crate::plugins::{Module, ModuleInitFn, MODULE_INIT_SYMBOL};

/// A module instance together with the library that backs its code.
///
/// Field order matters: the instance is dropped before the library is unloaded.
pub struct LoadedModule {
    module: Box<dyn Module>,
    path: PathBuf,
    #[allow(dead_code)]
    library: Option<Library>,
}

impl LoadedModule {
    pub fn new(module: Box<dyn Module>, path: impl Into<PathBuf>, library: Option<Library>) -> Self {
        Self {
            module,
            path: path.into(),
            library,
        }
    }

    /// Get the module instance
    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Turns an artifact path into a module instance.
///
/// The registry only talks to this trait, so tests can load modules from memory.
pub trait ModuleLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<LoadedModule, ModuleError>;
}

/// Loader for native shared libraries exporting `mbot_module_init`
#[derive(Debug, Default)]
pub struct DylibLoader;

impl DylibLoader {
    pub fn new() -> Self {
        Self
    }
}

/// Follow the `<name>.<ext>` alias to the versioned file it points at.
///
/// The dynamic linker caches handles by path, so opening a re-pointed alias
/// would hand back the image mapped for the previous target.
pub fn resolve_artifact(path: &Path) -> Result<PathBuf, ModuleError> {
    std::fs::canonicalize(path).map_err(|e| ModuleError::Open {
        path: path.display().to_string(),
        reason: if e.kind() == std::io::ErrorKind::NotFound {
            "file not found".to_string()
        } else {
            e.to_string()
        },
    })
}

impl ModuleLoader for DylibLoader {
    fn open(&self, requested: &Path) -> Result<LoadedModule, ModuleError> {
        let resolved = resolve_artifact(requested)?;
        let path = resolved.as_path();
        if path != requested {
            tracing::debug!("{} resolves to {}", requested.display(), path.display());
        }

        // Load the library
        let library = unsafe {
            Library::new(path).map_err(|e| ModuleError::Open {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        };

        // Get the init function
        let module = unsafe {
            let init_fn: Symbol<ModuleInitFn> =
                library.get(MODULE_INIT_SYMBOL).map_err(|e| ModuleError::Symbol {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;

            let module_ptr = init_fn();
            if module_ptr.is_null() {
                return Err(ModuleError::Contract(format!(
                    "{} returned a null module",
                    path.display()
                )));
            }
            Box::from_raw(module_ptr)
        };

        tracing::debug!("Opened module artifact {}", path.display());
        Ok(LoadedModule::new(module, path, Some(library)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_an_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DylibLoader::new().open(&dir.path().join("ghost.so"));
        assert!(matches!(result, Err(ModuleError::Open { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn alias_resolves_to_versioned_target() {
        let dir = tempfile::tempdir().unwrap();
        let v1 = dir.path().join("greeter_v1.0.so");
        let v2 = dir.path().join("greeter_v2.0.so");
        let alias = dir.path().join("greeter.so");
        std::fs::write(&v1, b"").unwrap();
        std::fs::write(&v2, b"").unwrap();

        std::os::unix::fs::symlink(&v1, &alias).unwrap();
        let first = resolve_artifact(&alias).unwrap();
        assert_eq!(first.file_name().unwrap(), "greeter_v1.0.so");

        std::fs::remove_file(&alias).unwrap();
        std::os::unix::fs::symlink(&v2, &alias).unwrap();
        let second = resolve_artifact(&alias).unwrap();
        assert_eq!(second.file_name().unwrap(), "greeter_v2.0.so");
        assert_ne!(first, second);
    }

    #[test]
    fn non_library_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.so");
        std::fs::write(&path, b"definitely not an ELF").unwrap();
        let result = DylibLoader::new().open(&path);
        assert!(matches!(result, Err(ModuleError::Open { .. })));
    }
}
