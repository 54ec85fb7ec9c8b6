//! Builder for configuring LibraryManager initialization.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::acquire::SourceAcquirer;
use crate::config::{EngineConfig, PlatformLibraries};
use crate::error::{BoardlibError, Result};
use crate::index::IndexCatalog;
use crate::network::{Downloader, RetryConfig};
use crate::registry::{InstalledRegistry, Scope};
use crate::settings::Settings;
use crate::LibraryManager;

/// Builder for configuring LibraryManager initialization.
///
/// # Example
///
/// ```rust,ignore
/// use boardlib::LibraryManager;
///
/// let manager = LibraryManager::builder("./libraries")
///     .with_index_file("./library_index.json")
///     .with_download_dir("./staging")
///     .auto_create_dirs(true)
///     .build()
///     .await?;
/// ```
pub struct LibraryManagerBuilder {
    config: EngineConfig,
    index_path: Option<PathBuf>,
    catalog: Option<IndexCatalog>,
    settings_path: Option<PathBuf>,
    retry: Option<RetryConfig>,
    auto_create_dirs: bool,
}

impl LibraryManagerBuilder {
    /// Create a new builder with the user library directory.
    pub fn new(user_dir: impl Into<PathBuf>) -> Self {
        Self::from_config(EngineConfig::new(user_dir))
    }

    /// Start from a complete configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            index_path: None,
            catalog: None,
            settings_path: None,
            retry: None,
            auto_create_dirs: false,
        }
    }

    /// Auto-create the user, builtin and download directories if they
    /// don't exist.
    ///
    /// Default: `false` (the user directory must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Directory whose libraries override platform ones for every board.
    pub fn with_builtin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.builtin_dir = Some(dir.into());
        self
    }

    /// Add the bundled-libraries directory of an installed platform.
    pub fn with_platform(mut self, platform_id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.config
            .platforms
            .push(PlatformLibraries::new(platform_id, dir));
        self
    }

    /// Download cache root.
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.download_dir = dir.into();
        self
    }

    /// Load the catalog from an index file. A missing file gives an empty
    /// catalog.
    pub fn with_index_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = Some(path.into());
        self
    }

    /// Use an already built catalog. Takes precedence over an index file.
    pub fn with_catalog(mut self, catalog: IndexCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Settings file holding the persisted unsafe-install opt-in.
    pub fn with_settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Enable git, zip and local directory sources.
    ///
    /// Default: `false`. The environment variable and the persisted
    /// setting can also enable them.
    pub fn with_unsafe_install(mut self, enable: bool) -> Self {
        self.config.unsafe_install = enable;
        self
    }

    /// Retry policy for artifact downloads.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the LibraryManager instance.
    pub async fn build(self) -> Result<LibraryManager> {
        let config = self.config;

        if self.auto_create_dirs {
            let mut dirs = vec![config.user_dir.clone(), config.library_downloads_dir()];
            dirs.extend(config.builtin_dir.clone());
            for dir in &dirs {
                std::fs::create_dir_all(dir).map_err(|e| BoardlibError::Io {
                    message: format!("Failed to create directory: {}", dir.display()),
                    path: Some(dir.clone()),
                    source: Some(e),
                })?;
            }
        } else if !config.user_dir.exists() {
            return Err(BoardlibError::Config {
                message: format!(
                    "User library directory does not exist: {}",
                    config.user_dir.display()
                ),
            });
        }

        let catalog = match (self.catalog, &self.index_path) {
            (Some(catalog), _) => catalog,
            (None, Some(path)) if path.exists() => IndexCatalog::load(path)?,
            (None, Some(path)) => {
                warn!("Library index {} not found, starting with an empty catalog", path.display());
                IndexCatalog::empty()
            }
            (None, None) => IndexCatalog::empty(),
        };

        let persisted = match &self.settings_path {
            Some(path) => Settings::load(path)?.library.enable_unsafe_install,
            None => false,
        };
        let unsafe_enabled = config.unsafe_install_enabled(persisted);

        let mut downloader = Downloader::new()?;
        if let Some(retry) = self.retry {
            downloader = downloader.with_retry(retry);
        }
        let downloader = Arc::new(downloader);
        let acquirer = SourceAcquirer::new(
            downloader.clone(),
            config.library_downloads_dir(),
            unsafe_enabled,
        );

        let registry = InstalledRegistry::scan(&Scope::from_config(&config))?;
        info!(
            "Library manager ready: {} installed, {} in index",
            registry.len(),
            catalog.len()
        );

        Ok(LibraryManager {
            config,
            catalog: Arc::new(catalog),
            registry: RwLock::new(registry),
            acquirer,
            downloader,
        })
    }
}
