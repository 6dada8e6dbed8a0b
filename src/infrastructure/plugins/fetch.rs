//! Remote module installation
//!
//! Downloads a prebuilt artifact into a scratch directory, installs it under its
//! versioned name with the stable alias next to it, then loads the versioned
//! file.

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::loader::ModuleLoader;
use super::manifest::{alias_file_name, versioned_file_name, ARTIFACT_EXTENSION};
use super::registry::{LoadOutcome, ModuleRegistry};
use crate::application::errors::ModuleError;

/// Prefix of per-download scratch directories
pub const TEMP_DIR_PREFIX: &str = "mbot_fetch_";

/// Something that can put the bytes behind a URL into a file
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ModuleError>;
}

/// HTTP(S) fetcher with a whole-request timeout
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ModuleError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mbot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ModuleError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ModuleError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ModuleError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ModuleError::Fetch(format!("{} returned {}", url, response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ModuleError::Fetch(e.to_string()))?;
        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

/// Installs downloaded artifacts into the module directory
pub struct ModuleInstaller {
    registry: Arc<ModuleRegistry>,
    loader: Arc<dyn ModuleLoader>,
    fetcher: Arc<dyn ArtifactFetcher>,
    module_dir: PathBuf,
    temp_root: PathBuf,
}

/// File name the download is stored under while it is inspected
fn download_name(url: &str) -> String {
    let last = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let safe = last
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if safe && last.ends_with(&format!(".{}", ARTIFACT_EXTENSION)) && !last.starts_with('.') {
        last.to_string()
    } else {
        format!("download.{}", ARTIFACT_EXTENSION)
    }
}

#[cfg(unix)]
fn link_alias(target: &Path, alias: &Path) -> std::io::Result<()> {
    // Relative target keeps the directory relocatable
    let target = target.file_name().map(Path::new).unwrap_or(target);
    std::os::unix::fs::symlink(target, alias)
}

#[cfg(not(unix))]
fn link_alias(target: &Path, alias: &Path) -> std::io::Result<()> {
    std::fs::copy(target, alias).map(|_| ())
}

impl ModuleInstaller {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        loader: Arc<dyn ModuleLoader>,
        fetcher: Arc<dyn ArtifactFetcher>,
        module_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            loader,
            fetcher,
            module_dir: module_dir.into(),
            temp_root: std::env::temp_dir(),
        }
    }

    pub fn with_temp_root(mut self, temp_root: impl Into<PathBuf>) -> Self {
        self.temp_root = temp_root.into();
        self
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Download, install and load the artifact at `url`
    pub async fn install_from_url(&self, url: &str) -> Result<LoadOutcome, ModuleError> {
        let scratch = self
            .temp_root
            .join(format!("{}{}", TEMP_DIR_PREFIX, uuid::Uuid::new_v4().simple()));
        tokio::fs::create_dir_all(&scratch).await?;

        let result = self.install_via(url, &scratch).await;

        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            tracing::warn!("Failed to remove {}: {}", scratch.display(), e);
        }
        result
    }

    async fn install_via(&self, url: &str, scratch: &Path) -> Result<LoadOutcome, ModuleError> {
        let downloaded = scratch.join(download_name(url));
        let size = self.fetcher.fetch(url, &downloaded).await?;
        tracing::info!("Downloaded {} bytes from {}", size, url);

        let (name, version) = {
            let probe = self.loader.open(&downloaded)?;
            let name = probe.module().name().trim().to_string();
            let version = probe.module().version().trim().to_string();
            (name, version)
        };
        if name.is_empty() || version.is_empty() {
            return Err(ModuleError::Contract(format!(
                "artifact from {} does not report a name and version",
                url
            )));
        }

        tokio::fs::create_dir_all(&self.module_dir).await?;
        let versioned = self.module_dir.join(versioned_file_name(&name, &version));
        let alias = self.module_dir.join(alias_file_name(&name));

        tokio::fs::copy(&downloaded, &versioned).await?;
        if tokio::fs::symlink_metadata(&alias).await.is_ok() {
            tokio::fs::remove_file(&alias).await?;
        }
        link_alias(&versioned, &alias)?;
        tracing::info!("Installed module {} version {} as {}", name, version, versioned.display());

        self.registry.load(&versioned)
    }
}

/// Remove scratch directories older than `max_age`. Returns how many were removed.
pub fn sweep_temp_dirs(temp_root: &Path, max_age: Duration) -> usize {
    let entries = match std::fs::read_dir(temp_root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot scan {} for stale downloads: {}", temp_root.display(), e);
            return 0;
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let is_ours = entry
            .file_name()
            .to_str()
            .map(|n| n.starts_with(TEMP_DIR_PREFIX))
            .unwrap_or(false);
        if !is_ours {
            continue;
        }
        let stale = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .map(|age| age >= max_age)
            .unwrap_or(false);
        if stale {
            match std::fs::remove_dir_all(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove {}: {}", entry.path().display(), e),
            }
        }
    }
    if removed > 0 {
        tracing::info!("Removed {} stale download directories", removed);
    }
    removed
}
