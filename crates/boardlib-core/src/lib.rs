//! Boardlib - headless engine for hardware-platform library management.
//!
//! Resolves, installs, upgrades and removes add-on libraries for board
//! platforms. Libraries come from a published index, or, behind an explicit
//! opt-in, from git repositories, zip archives and local directories. The
//! crate has no CLI or RPC layer of its own; see the `boardlib-cli` crate
//! for a command-line driver.
//!
//! # Example
//!
//! ```rust,ignore
//! use boardlib::{CancellationToken, InstallOptions, LibraryManager, ResolveRequest};
//!
//! #[tokio::main]
//! async fn main() -> boardlib::Result<()> {
//!     let manager = LibraryManager::builder("/home/me/Arduino/libraries")
//!         .with_index_file("/home/me/.boardlib/library_index.json")
//!         .auto_create_dirs(true)
//!         .build()
//!         .await?;
//!
//!     let report = manager
//!         .install(
//!             &ResolveRequest::parse("Servo@1.2.1"),
//!             InstallOptions::default(),
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!     println!("{}", report.plan);
//!     Ok(())
//! }
//! ```

pub mod acquire;
pub mod cancel;
pub mod compat;
pub mod config;
pub mod error;
pub mod index;
pub mod install;
pub mod network;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod version;

mod api;

pub use acquire::{SourceAcquirer, SourceRequest, StagedLibrary};
pub use api::{
    InstallOptions, LibraryExamples, LibraryListing, LibraryManagerBuilder, ListFilter,
};
pub use cancel::{CancellationToken, CancelledError};
pub use compat::Fqbn;
pub use config::{EngineConfig, PlatformLibraries};
pub use error::{BoardlibError, Result};
pub use index::{IndexCatalog, LibraryRelease, UsageTag};
pub use install::{EntryOutcome, EntryStatus, InstallReport};
pub use registry::{InstalledLibrary, InstalledRegistry, LibraryLocation};
pub use resolver::{
    DependencyStatus, InstallScope, Plan, PlanAction, PlanEntry, ResolveOptions, ResolveRequest,
};
pub use settings::Settings;
pub use version::{Version, VersionConstraint};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Main entry point of the engine.
///
/// One instance owns one set of library directories. Mutating operations
/// (installs, upgrades, uninstalls, rescans) take an exclusive lock on the
/// installed registry for their whole duration; listings and dependency
/// queries share it. The catalog is immutable once built.
///
/// `LibraryManager` is `Send + Sync`; wrap it in an `Arc` to share it
/// between concurrent requests.
pub struct LibraryManager {
    config: EngineConfig,
    catalog: Arc<IndexCatalog>,
    registry: RwLock<InstalledRegistry>,
    acquirer: SourceAcquirer,
    downloader: Arc<network::Downloader>,
}

impl LibraryManager {
    /// Create a builder rooted at the user library directory.
    ///
    /// ```rust,ignore
    /// let manager = LibraryManager::builder("./libraries")
    ///     .with_builtin_dir("./builtin")
    ///     .with_platform("arduino:avr", "./hardware/avr/libraries")
    ///     .build()
    ///     .await?;
    /// ```
    pub fn builder(user_dir: impl Into<std::path::PathBuf>) -> LibraryManagerBuilder {
        LibraryManagerBuilder::new(user_dir)
    }

    /// Create a manager from a complete configuration with an empty catalog.
    pub async fn new(config: EngineConfig) -> Result<Self> {
        LibraryManagerBuilder::from_config(config).build().await
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The loaded index.
    pub fn catalog(&self) -> Arc<IndexCatalog> {
        self.catalog.clone()
    }

    /// Whether git/zip/local installs are enabled for this instance.
    pub fn unsafe_install_enabled(&self) -> bool {
        self.acquirer.unsafe_enabled()
    }

    fn orchestrator(&self) -> install::InstallOrchestrator<'_> {
        install::InstallOrchestrator::new(&self.config, &self.acquirer)
    }
}
