//! Module artifact naming
//!
//! Artifacts are installed as `<name>_v<version>.<ext>` next to a stable alias
//! `<name>.<ext>`. Modules are keyed by their logical name, never by path.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

/// Shared library extension for this platform (`so`, `dylib`, `dll`)
pub const ARTIFACT_EXTENSION: &str = std::env::consts::DLL_EXTENSION;

static VERSIONED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+)_v([0-9][0-9.]*)\.([A-Za-z0-9]+)$").expect("valid artifact pattern")
});

/// A file name split into its logical parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub base: String,
    pub version: Option<String>,
    pub extension: String,
}

impl ArtifactName {
    /// Parse `name_v1.2.3.so` or `name.so`. Returns `None` for other extensions.
    pub fn parse(file_name: &str) -> Option<Self> {
        if let Some(caps) = VERSIONED_NAME.captures(file_name) {
            let extension = caps[3].to_string();
            if extension != ARTIFACT_EXTENSION {
                return None;
            }
            return Some(Self {
                base: caps[1].to_string(),
                version: Some(caps[2].trim_end_matches('.').to_string()),
                extension,
            });
        }

        let (base, extension) = file_name.rsplit_once('.')?;
        if extension != ARTIFACT_EXTENSION || base.is_empty() {
            return None;
        }
        Some(Self {
            base: base.to_string(),
            version: None,
            extension: extension.to_string(),
        })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name().and_then(|n| n.to_str()).and_then(Self::parse)
    }
}

pub fn is_artifact(path: &Path) -> bool {
    ArtifactName::from_path(path).is_some()
}

pub fn versioned_file_name(base: &str, version: &str) -> String {
    format!("{}_v{}.{}", base, version, ARTIFACT_EXTENSION)
}

pub fn alias_file_name(base: &str) -> String {
    format!("{}.{}", base, ARTIFACT_EXTENSION)
}

/// Path loaded for `load <name>`; a trailing extension on `name` is tolerated.
pub fn alias_path(dir: &Path, name: &str) -> PathBuf {
    let suffix = format!(".{}", ARTIFACT_EXTENSION);
    let base = name.strip_suffix(&suffix).unwrap_or(name);
    dir.join(alias_file_name(base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_and_alias_names() {
        let versioned = ArtifactName::parse(&format!("greeter_v1.2.0.{}", ARTIFACT_EXTENSION)).unwrap();
        assert_eq!(versioned.base, "greeter");
        assert_eq!(versioned.version.as_deref(), Some("1.2.0"));

        let alias = ArtifactName::parse(&alias_file_name("greeter")).unwrap();
        assert_eq!(alias.base, "greeter");
        assert_eq!(alias.version, None);
    }

    #[test]
    fn underscores_in_base_name_survive() {
        let name = ArtifactName::parse(&versioned_file_name("nick_mention", "2.0")).unwrap();
        assert_eq!(name.base, "nick_mention");
        assert_eq!(name.version.as_deref(), Some("2.0"));
    }

    #[test]
    fn rejects_foreign_files() {
        assert!(ArtifactName::parse("notes.txt").is_none());
        assert!(ArtifactName::parse("README").is_none());
        assert!(!is_artifact(Path::new("plugins/source.rs")));
    }

    #[test]
    fn alias_path_tolerates_extension() {
        let dir = Path::new("plugins");
        let expected = dir.join(alias_file_name("echo"));
        assert_eq!(alias_path(dir, "echo"), expected);
        assert_eq!(alias_path(dir, &alias_file_name("echo")), expected);
    }
}
