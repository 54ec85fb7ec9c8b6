//! Mutating methods on LibraryManager.

use crate::acquire::{IndexArtifactAcquirer, SourceRequest};
use crate::cancel::CancellationToken;
use crate::config::InstallConfig;
use crate::error::{BoardlibError, Result};
use crate::index::UsageTag;
use crate::install::{EntryOutcome, EntryStatus, InstallReport};
use crate::registry::InstalledLibrary;
use crate::resolver::{InstallScope, ResolveOptions, ResolveRequest, VersionResolver};
use crate::LibraryManager;
use std::path::PathBuf;
use tracing::info;

/// Options shared by every install flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Install only the requested library.
    pub no_deps: bool,
    /// Fail instead of replacing an installed version.
    pub no_overwrite: bool,
    /// Install into the builtin directory instead of the user one.
    pub install_in_builtin: bool,
}

impl InstallOptions {
    pub fn scope(&self) -> InstallScope {
        if self.install_in_builtin {
            InstallScope::Builtin
        } else {
            InstallScope::User
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            no_deps: self.no_deps,
            no_overwrite: self.no_overwrite,
            scope: self.scope(),
        }
    }
}

impl LibraryManager {
    // ========================================
    // Index installs
    // ========================================

    /// Resolve a request against the index and apply the plan.
    ///
    /// Resolution failures leave the filesystem untouched. Reinstalling an
    /// up-to-date library succeeds without changes.
    pub async fn install(
        &self,
        request: &ResolveRequest,
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let orchestrator = self.orchestrator();
        let mut registry = self.registry.write().await;
        *registry = orchestrator.rescan()?;

        let plan = VersionResolver::new(&self.catalog, &registry).resolve(request, options.resolve_options())?;
        info!("Installing {}", request.name);
        orchestrator
            .apply(plan, &mut registry, options.no_overwrite, cancel)
            .await
    }

    /// Upgrade the named libraries, or every user and builtin library when
    /// `names` is empty. Libraries already at their newest release, and
    /// libraries the index doesn't know, are left alone.
    pub async fn upgrade(
        &self,
        names: &[String],
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let orchestrator = self.orchestrator();
        let mut registry = self.registry.write().await;
        *registry = orchestrator.rescan()?;

        let targets: Vec<String> = if names.is_empty() {
            let mut all: Vec<String> = Vec::new();
            for lib in registry.libraries() {
                if lib.location.is_platform_bundled() || all.iter().any(|n| lib.answers_to(n)) {
                    continue;
                }
                all.push(lib.name.clone());
            }
            all
        } else {
            names.to_vec()
        };

        let resolve_options = ResolveOptions {
            no_deps: options.no_deps,
            no_overwrite: options.no_overwrite,
            ..Default::default()
        };
        let mut report = InstallReport::default();
        for name in &targets {
            let resolved = VersionResolver::new(&self.catalog, &registry).resolve_upgrade(name, resolve_options);
            let step = match resolved {
                Ok(Some(plan)) => {
                    orchestrator
                        .apply(plan, &mut registry, options.no_overwrite, cancel)
                        .await
                }
                Ok(None) => continue,
                Err(e) => Err(e),
            };

            match step {
                Ok(step) => {
                    let stopped = step.failure().is_some();
                    report.merge(step);
                    if stopped {
                        break;
                    }
                }
                Err(e) if report.placed().next().is_none() => return Err(e),
                Err(e) => {
                    report.outcomes.push(EntryOutcome {
                        name: name.clone(),
                        version: None,
                        path: None,
                        status: EntryStatus::failed(&e),
                    });
                    break;
                }
            }
        }

        if report.is_noop() {
            info!("All libraries are up to date");
        }
        Ok(report)
    }

    /// Remove the user or builtin copy of a library.
    pub async fn uninstall(&self, name: &str) -> Result<InstalledLibrary> {
        let orchestrator = self.orchestrator();
        let mut registry = self.registry.write().await;
        *registry = orchestrator.rescan()?;
        orchestrator.uninstall(name, &mut registry)
    }

    /// Fetch and verify a release archive into the download cache without
    /// installing it. Returns the cached archive path.
    pub async fn download(&self, request: &ResolveRequest, cancel: &CancellationToken) -> Result<PathBuf> {
        let release = self
            .catalog
            .find_release(&request.name, request.version.as_deref())?
            .clone();
        let url = release.artifact_url(UsageTag::Download)?;
        let integrity = match &release.resource {
            Some(resource) => resource.integrity()?,
            None => Default::default(),
        };

        let acquirer = IndexArtifactAcquirer::new(
            release,
            UsageTag::Download,
            self.downloader.clone(),
            self.config.library_downloads_dir(),
        );
        let path = acquirer.cache_path()?;
        self.downloader.fetch(&url, &path, &integrity, cancel).await?;
        info!("Downloaded {}", path.display());
        Ok(path)
    }

    // ========================================
    // Untrusted sources
    // ========================================

    /// Install libraries from local zip archives, in order.
    pub async fn install_zip(
        &self,
        paths: &[PathBuf],
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let requests: Vec<SourceRequest> = paths
            .iter()
            .map(|path| SourceRequest::Zip { path: path.clone() })
            .collect();
        self.install_sources(&requests, options, cancel).await
    }

    /// Install libraries from git repositories (`url[#ref]`), in order.
    pub async fn install_git(
        &self,
        urls: &[String],
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let requests: Vec<SourceRequest> = urls
            .iter()
            .map(|url| SourceRequest::Git { url: url.clone() })
            .collect();
        self.install_sources(&requests, options, cancel).await
    }

    /// Install a library from a local directory.
    pub async fn install_local(
        &self,
        dir: impl Into<PathBuf>,
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let requests = [SourceRequest::LocalDir { path: dir.into() }];
        self.install_sources(&requests, options, cancel).await
    }

    async fn install_sources(
        &self,
        requests: &[SourceRequest],
        options: InstallOptions,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        // Checked before taking the lock so a disabled opt-in never waits.
        if requests.iter().any(SourceRequest::is_untrusted) && !self.acquirer.unsafe_enabled() {
            return Err(BoardlibError::UnsafeInstallDisabled {
                env_var: InstallConfig::UNSAFE_INSTALL_ENV,
            });
        }

        let orchestrator = self.orchestrator();
        let mut registry = self.registry.write().await;
        *registry = orchestrator.rescan()?;
        orchestrator
            .install_sources(
                requests,
                options.scope(),
                &mut registry,
                options.no_overwrite,
                cancel,
            )
            .await
    }
}
