//! Installation orchestration.
//!
//! Applies resolved plans and untrusted sources to the library directories.
//! Acquisition of independent entries runs concurrently; placement is
//! sequential and re-checks the registry before every move, because the
//! snapshot the plan was computed from may be stale by then.

pub mod placement;
mod report;

pub use report::{EntryOutcome, EntryStatus, InstallReport};

use crate::acquire::{SourceAcquirer, SourceRequest, StagedLibrary};
use crate::cancel::CancellationToken;
use crate::config::{EngineConfig, InstallConfig};
use crate::error::{BoardlibError, Result};
use crate::registry::{InstalledLibrary, InstalledRegistry, Scope};
use crate::resolver::{multiple_installations, InstallScope, Plan, PlanEntry};
use futures::future::try_join_all;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Places acquired libraries and keeps the registry snapshot current.
pub struct InstallOrchestrator<'a> {
    config: &'a EngineConfig,
    acquirer: &'a SourceAcquirer,
}

impl<'a> InstallOrchestrator<'a> {
    pub fn new(config: &'a EngineConfig, acquirer: &'a SourceAcquirer) -> Self {
        Self { config, acquirer }
    }

    /// Library directory of a destination scope.
    pub fn destination_root(&self, scope: InstallScope) -> Result<PathBuf> {
        match scope {
            InstallScope::User => Ok(self.config.user_dir.clone()),
            InstallScope::Builtin => self.config.builtin_dir.clone().ok_or_else(|| BoardlibError::Config {
                message: "no builtin library directory is configured".to_string(),
            }),
        }
    }

    /// Rescan every configured scope.
    pub fn rescan(&self) -> Result<InstalledRegistry> {
        InstalledRegistry::scan(&Scope::from_config(self.config))
    }

    /// Apply a plan. Acquisition failures abort before anything is placed.
    /// A placement failure stops the remaining entries; it is the error of
    /// the call only when no entry was placed yet.
    pub async fn apply(
        &self,
        plan: Plan,
        registry: &mut InstalledRegistry,
        no_overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let mutations: Vec<&PlanEntry> = plan.mutations().collect();
        debug!("Acquiring {} plan entries", mutations.len());
        let staged = try_join_all(mutations.iter().map(|entry| self.acquire_entry(entry, cancel))).await?;
        let mut staged = staged.into_iter();

        let mut outcomes = Vec::with_capacity(plan.entries.len());
        for entry in &plan.entries {
            if !entry.is_mutation() {
                outcomes.push(EntryOutcome {
                    name: entry.name.clone(),
                    version: Some(entry.version.clone()),
                    path: None,
                    status: EntryStatus::AlreadyInstalled,
                });
                continue;
            }

            let result = match staged.next() {
                Some(library) => self.place(&library, entry.scope, registry, no_overwrite, cancel),
                None => Err(BoardlibError::Other(format!("{} was not acquired", entry.id()))),
            };
            match result {
                Ok((path, status)) => outcomes.push(EntryOutcome {
                    name: entry.name.clone(),
                    version: Some(entry.version.clone()),
                    path: Some(path),
                    status,
                }),
                Err(e) => {
                    if !outcomes.iter().any(|o: &EntryOutcome| o.status.is_placed()) {
                        return Err(e);
                    }
                    warn!("Stopping after {} failed: {}", entry.id(), e);
                    outcomes.push(EntryOutcome {
                        name: entry.name.clone(),
                        version: Some(entry.version.clone()),
                        path: None,
                        status: EntryStatus::failed(&e),
                    });
                    break;
                }
            }
        }

        let mut report = InstallReport::new(plan);
        report.outcomes = outcomes;
        Ok(report)
    }

    /// Install untrusted sources one after the other. Dependencies of these
    /// libraries are not resolved.
    pub async fn install_sources(
        &self,
        requests: &[SourceRequest],
        scope: InstallScope,
        registry: &mut InstalledRegistry,
        no_overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<InstallReport> {
        let dest_root = self.destination_root(scope)?;
        let mut report = InstallReport::default();

        for request in requests {
            let result = match self.acquirer.acquire(request, &dest_root, cancel).await {
                Ok(staged) => self
                    .place(&staged, scope, registry, no_overwrite, cancel)
                    .map(|(path, status)| (staged, path, status)),
                Err(e) => Err(e),
            };

            match result {
                Ok((staged, path, status)) => {
                    if staged.untrusted
                        && !report
                            .advisories
                            .iter()
                            .any(|a| a == InstallConfig::UNSAFE_INSTALL_ADVISORY)
                    {
                        report
                            .advisories
                            .push(InstallConfig::UNSAFE_INSTALL_ADVISORY.to_string());
                    }
                    report.outcomes.push(EntryOutcome {
                        name: staged.name.clone(),
                        version: staged.version.clone(),
                        path: Some(path),
                        status,
                    });
                }
                Err(e) => {
                    if report.placed().next().is_none() {
                        return Err(e);
                    }
                    warn!("Stopping after {} failed: {}", request.describe(), e);
                    report.outcomes.push(EntryOutcome {
                        name: request.describe(),
                        version: None,
                        path: None,
                        status: EntryStatus::failed(&e),
                    });
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Remove the single user or builtin copy of `name`.
    pub fn uninstall(&self, name: &str, registry: &mut InstalledRegistry) -> Result<InstalledLibrary> {
        let target = match registry.find_shared(name).as_slice() {
            [one] => (*one).clone(),
            [] => {
                return Err(match registry.find_by_name(name).first() {
                    Some(bundled) => BoardlibError::PlatformBundled {
                        name: bundled.name.clone(),
                        platform: bundled.location.to_string(),
                    },
                    None => BoardlibError::NotInstalled {
                        name: name.to_string(),
                    },
                })
            }
            many => return Err(multiple_installations(name, many)),
        };

        placement::remove(&target.path)?;
        *registry = self.rescan()?;
        info!("Uninstalled {}", target.id());
        Ok(target)
    }

    async fn acquire_entry(&self, entry: &PlanEntry, cancel: &CancellationToken) -> Result<StagedLibrary> {
        let release = entry
            .release
            .clone()
            .ok_or_else(|| BoardlibError::Other(format!("{} has no index release", entry.id())))?;
        let dest_root = self.destination_root(entry.scope)?;
        let request = SourceRequest::IndexArtifact {
            release,
            usage: entry.usage,
        };
        self.acquirer.acquire(&request, &dest_root, cancel).await
    }

    /// Move one staged library into `scope` after re-checking conflicts and
    /// the overwrite policy against the current registry.
    fn place(
        &self,
        staged: &StagedLibrary,
        scope: InstallScope,
        registry: &mut InstalledRegistry,
        no_overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<(PathBuf, EntryStatus)> {
        let dest_root = self.destination_root(scope)?;

        let replaced = match registry.find_shared(&staged.name).as_slice() {
            [] => None,
            [one] => {
                if InstallScope::from_location(&one.location) != Some(scope) {
                    return Err(BoardlibError::MultipleInstallations {
                        name: staged.name.clone(),
                        locations: vec![
                            one.path.display().to_string(),
                            format!("{} directory", scope),
                        ],
                    });
                }
                if one.version.is_some() && one.version == staged.version {
                    debug!("{} is already installed, leaving it in place", one.id());
                    return Ok((one.path.clone(), EntryStatus::AlreadyInstalled));
                }
                if no_overwrite {
                    return Err(BoardlibError::OverwriteRefused {
                        name: staged.name.clone(),
                        installed: one.raw_version.clone().unwrap_or_else(|| "unknown".to_string()),
                    });
                }
                Some((*one).clone())
            }
            many => return Err(multiple_installations(&staged.name, many)),
        };

        let path = placement::place(
            staged,
            &dest_root,
            replaced.as_ref().map(|l| l.path.as_path()),
            cancel,
        )?;
        *registry = self.rescan()?;

        let status = match replaced {
            Some(previous) => EntryStatus::Upgraded {
                from: previous.version,
            },
            None => EntryStatus::Installed,
        };
        Ok((path, status))
    }
}
