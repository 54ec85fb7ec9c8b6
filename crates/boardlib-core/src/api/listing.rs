//! Read-side methods on LibraryManager.

use crate::compat::{is_compatible, Fqbn};
use crate::error::{BoardlibError, Result};
use crate::index::LibraryRelease;
use crate::registry::{find_examples, InstalledLibrary, InstalledRegistry, LibraryLocation};
use crate::resolver::{DependencyStatus, Plan, ResolveOptions, ResolveRequest, VersionResolver};
use crate::version::Version;
use crate::LibraryManager;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Which installed libraries `list` returns.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Include every platform's bundled libraries.
    pub all: bool,
    /// Only libraries with a newer release in the index.
    pub updatable: bool,
    /// Only libraries answering to this name.
    pub name: Option<String>,
    /// Annotate compatibility with this board and include its platform's
    /// bundled libraries.
    pub board: Option<Fqbn>,
}

/// One row of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryListing {
    pub library: InstalledLibrary,
    /// Newest version in the index.
    pub latest: Option<Version>,
    /// Compatibility with the filter's board, when one was given.
    pub compatible: Option<bool>,
}

impl LibraryListing {
    /// A newer release exists, or the installed version is unknown.
    pub fn is_updatable(&self) -> bool {
        match (&self.latest, &self.library.version) {
            (Some(latest), Some(installed)) => latest > installed,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}

/// Example sketches of one installed library.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryExamples {
    pub library: InstalledLibrary,
    pub examples: Vec<PathBuf>,
}

impl LibraryManager {
    // ========================================
    // Registry
    // ========================================

    /// Snapshot of the installed registry.
    pub async fn installed(&self) -> InstalledRegistry {
        self.registry.read().await.clone()
    }

    /// Rescan the library directories. Returns the number of libraries.
    pub async fn refresh(&self) -> Result<usize> {
        let mut registry = self.registry.write().await;
        *registry = self.orchestrator().rescan()?;
        Ok(registry.len())
    }

    /// List installed libraries. Duplicates are listed, not rejected.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<LibraryListing>> {
        let board_platform = match &filter.board {
            Some(board) => {
                let platform_id = board.platform_id();
                let platform = self
                    .config
                    .platform(&platform_id)
                    .ok_or(BoardlibError::UnknownPlatform { platform: platform_id })?;
                Some(platform.platform_id.clone())
            }
            None => None,
        };

        let registry = self.registry.read().await;
        let mut rows: Vec<LibraryListing> = registry
            .libraries()
            .iter()
            .filter(|lib| match &lib.location {
                LibraryLocation::PlatformBundled { platform_id } => {
                    filter.all
                        || board_platform
                            .as_ref()
                            .is_some_and(|p| p.eq_ignore_ascii_case(platform_id))
                }
                _ => true,
            })
            .filter(|lib| filter.name.as_deref().map_or(true, |name| lib.answers_to(name)))
            .map(|lib| LibraryListing {
                latest: self.catalog.latest(&lib.name).ok().map(|r| r.version.clone()),
                compatible: filter
                    .board
                    .as_ref()
                    .map(|board| is_compatible(&lib.architectures, board)),
                library: lib.clone(),
            })
            .filter(|row| {
                !filter.updatable
                    || (!row.library.location.is_platform_bundled() && row.is_updatable())
            })
            .collect();

        rows.sort_by(|a, b| {
            a.library
                .name
                .to_lowercase()
                .cmp(&b.library.name.to_lowercase())
                .then_with(|| a.library.path.cmp(&b.library.path))
        });
        debug!("Listing {} libraries", rows.len());
        Ok(rows)
    }

    /// Example sketches of installed libraries, optionally only those
    /// answering to `name`. Every installed copy is reported, bundled ones
    /// included.
    pub async fn examples(&self, name: Option<&str>) -> Vec<LibraryExamples> {
        let registry = self.registry.read().await;
        let mut rows: Vec<LibraryExamples> = registry
            .libraries()
            .iter()
            .filter(|lib| name.map_or(true, |name| lib.answers_to(name)))
            .map(|lib| LibraryExamples {
                examples: find_examples(&lib.path),
                library: lib.clone(),
            })
            .collect();
        rows.sort_by(|a, b| {
            a.library
                .name
                .to_lowercase()
                .cmp(&b.library.name.to_lowercase())
                .then_with(|| a.library.path.cmp(&b.library.path))
        });
        rows
    }

    // ========================================
    // Index
    // ========================================

    /// Latest release of every library matching all query terms.
    pub fn search(&self, query: &str) -> Vec<LibraryRelease> {
        self.catalog.search(query).into_iter().cloned().collect()
    }

    /// Resolved dependency closure of a release with installed versions.
    pub async fn deps(&self, request: &ResolveRequest) -> Result<Vec<DependencyStatus>> {
        let registry = self.registry.read().await;
        VersionResolver::new(&self.catalog, &registry).dependency_status(request)
    }

    /// Compute an install plan without applying it.
    pub async fn resolve(&self, request: &ResolveRequest, options: ResolveOptions) -> Result<Plan> {
        let registry = self.registry.read().await;
        VersionResolver::new(&self.catalog, &registry).resolve(request, options)
    }
}
