//! Source acquisition.
//!
//! Every source kind ends the same way: a validated library directory in a
//! staging area next to its destination, ready to be moved into place.
//! Nothing here touches an install directory.

pub mod archive;
mod git;
mod index_artifact;
mod local_dir;
mod zip_archive;

pub use git::{GitAcquirer, GitSource};
pub use index_artifact::IndexArtifactAcquirer;
pub use local_dir::LocalDirAcquirer;
pub use zip_archive::ZipAcquirer;

use crate::cancel::CancellationToken;
use crate::config::InstallConfig;
use crate::error::{BoardlibError, Result};
use crate::index::{LibraryRelease, UsageTag};
use crate::network::Downloader;
use crate::registry::{validate_library_dir, LibraryContents};
use crate::version::Version;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::warn;

/// Where a library comes from.
#[derive(Debug, Clone)]
pub enum SourceRequest {
    /// A release from the index, tagged with why it is fetched.
    IndexArtifact {
        release: LibraryRelease,
        usage: UsageTag,
    },
    /// `url[#ref]`.
    Git { url: String },
    /// A local zip archive.
    Zip { path: PathBuf },
    /// A local directory, used in place.
    LocalDir { path: PathBuf },
}

impl SourceRequest {
    /// Sources outside the index need the explicit opt-in.
    pub fn is_untrusted(&self) -> bool {
        !matches!(self, SourceRequest::IndexArtifact { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            SourceRequest::IndexArtifact { release, .. } => release.id(),
            SourceRequest::Git { url } => url.clone(),
            SourceRequest::Zip { path } | SourceRequest::LocalDir { path } => {
                path.display().to_string()
            }
        }
    }
}

/// A validated library ready for placement.
#[derive(Debug)]
pub struct StagedLibrary {
    /// Directory holding the library content.
    pub root: PathBuf,
    /// Declared name, or the name derived from the source.
    pub name: String,
    pub version: Option<Version>,
    pub contents: LibraryContents,
    /// URL or path the content came from.
    pub origin: String,
    pub untrusted: bool,
    /// Staging area owning `root`; `None` when `root` is the caller's
    /// directory and must be copied, not moved.
    staging: Option<TempDir>,
}

impl StagedLibrary {
    /// Validate `root` and derive the library identity from its manifest.
    pub(crate) fn validate(
        root: PathBuf,
        staging: Option<TempDir>,
        fallback_name: &str,
        origin: String,
        untrusted: bool,
    ) -> Result<Self> {
        let contents = validate_library_dir(&root)?;
        let manifest = contents.manifest.as_ref();
        let name = manifest
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| fallback_name.to_string());
        let version = manifest
            .and_then(|m| m.version.as_deref())
            .and_then(|raw| Version::parse(raw).ok());

        Ok(Self {
            root,
            name,
            version,
            contents,
            origin,
            untrusted,
            staging,
        })
    }

    /// Whether `root` belongs to the staging area and may be moved.
    pub fn owns_content(&self) -> bool {
        self.staging.is_some()
    }

    /// Directory the staging area lives in, if any.
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging.as_ref().map(TempDir::path)
    }
}

/// Create a staging directory under `staging_root`.
///
/// Staging next to the destination keeps the final move a same-filesystem
/// rename.
pub(crate) fn new_staging_dir(staging_root: &Path) -> Result<TempDir> {
    std::fs::create_dir_all(staging_root)
        .map_err(|e| BoardlibError::io_with_path(e, staging_root))?;
    tempfile::Builder::new()
        .prefix(InstallConfig::STAGING_PREFIX)
        .tempdir_in(staging_root)
        .map_err(|e| BoardlibError::io_with_path(e, staging_root))
}

/// One way of producing a staged library.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn acquire(&self, staging_root: &Path, cancel: &CancellationToken) -> Result<StagedLibrary>;
}

/// Dispatches a [`SourceRequest`] to its acquirer after the opt-in check.
#[derive(Clone)]
pub struct SourceAcquirer {
    downloader: Arc<Downloader>,
    downloads_dir: PathBuf,
    unsafe_enabled: bool,
}

impl SourceAcquirer {
    pub fn new(downloader: Arc<Downloader>, downloads_dir: PathBuf, unsafe_enabled: bool) -> Self {
        Self {
            downloader,
            downloads_dir,
            unsafe_enabled,
        }
    }

    pub fn unsafe_enabled(&self) -> bool {
        self.unsafe_enabled
    }

    /// Build the acquirer for a request. Untrusted sources fail here,
    /// before any IO, when the opt-in is off.
    pub fn acquirer_for(&self, request: &SourceRequest) -> Result<Box<dyn Acquirer>> {
        if request.is_untrusted() && !self.unsafe_enabled {
            return Err(BoardlibError::UnsafeInstallDisabled {
                env_var: InstallConfig::UNSAFE_INSTALL_ENV,
            });
        }

        Ok(match request {
            SourceRequest::IndexArtifact { release, usage } => Box::new(IndexArtifactAcquirer::new(
                release.clone(),
                *usage,
                self.downloader.clone(),
                self.downloads_dir.clone(),
            )),
            SourceRequest::Git { url } => Box::new(GitAcquirer::new(GitSource::parse(url)?)),
            SourceRequest::Zip { path } => Box::new(ZipAcquirer::new(path.clone())),
            SourceRequest::LocalDir { path } => Box::new(LocalDirAcquirer::new(path.clone())),
        })
    }

    /// Acquire a source into `staging_root`.
    pub async fn acquire(
        &self,
        request: &SourceRequest,
        staging_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<StagedLibrary> {
        let acquirer = self.acquirer_for(request)?;
        let staged = acquirer.acquire(staging_root, cancel).await?;
        if staged.untrusted {
            warn!("{}", InstallConfig::UNSAFE_INSTALL_ADVISORY);
        }
        Ok(staged)
    }
}
