//! Module loading for mbot
//!
//! Modules are shared libraries loaded at runtime through a [`ModuleLoader`] and
//! tracked by logical name in the [`ModuleRegistry`].

pub mod fetch;
pub mod loader;
pub mod manifest;
pub mod registry;

pub use fetch::{sweep_temp_dirs, ArtifactFetcher, HttpFetcher, ModuleInstaller};
pub use loader::{DylibLoader, LoadedModule, ModuleLoader};
pub use manifest::ArtifactName;
pub use registry::{LoadOutcome, ModuleEntry, ModuleInfo, ModuleRegistry};
