//! Version resolution.
//!
//! Breadth-first expansion of the dependency graph from the requested
//! release. Each dependency is bound the first time it is reached: an
//! installed copy whose version satisfies the edge wins, otherwise the newest
//! index release satisfying it. Later edges to an already bound dependency
//! intersect their range with the accumulated one. When the bound version
//! falls outside the intersection, the intersection is pinned for that name
//! and the expansion restarts, so the dependency is re-bound to the newest
//! candidate inside it. Pins only narrow, which bounds the restarts. There is
//! no search over alternative releases of other dependencies.

mod plan;

pub use plan::{
    InstallScope, Plan, PlanAction, PlanEntry, PlanReason, SatisfiedDependency,
};

use crate::error::{BoardlibError, Result};
use crate::index::{sanitize_name, Dependency, IndexCatalog, LibraryRelease, UsageTag};
use crate::registry::{InstalledLibrary, InstalledRegistry};
use crate::version::{Version, VersionConstraint};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// A library requested by name, optionally at a specific version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub name: String,
    pub version: Option<String>,
}

impl ResolveRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Parse `Name` or `Name@version`.
    pub fn parse(input: &str) -> Self {
        match input.rsplit_once('@') {
            Some((name, version)) if !name.trim().is_empty() => Self {
                name: name.trim().to_string(),
                version: Some(version.trim().to_string()).filter(|v| !v.is_empty()),
            },
            _ => Self::new(input.trim()),
        }
    }
}

/// Resolution policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Do not expand dependencies of the requested library.
    pub no_deps: bool,
    /// Fail instead of replacing any installed version.
    pub no_overwrite: bool,
    /// Destination for new installs.
    pub scope: InstallScope,
}

/// One row of a dependency status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyStatus {
    pub name: String,
    pub version_required: Version,
    pub version_installed: Option<Version>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Install,
    Upgrade,
}

#[derive(Debug, Clone)]
enum Binding {
    Index(LibraryRelease),
    Installed(InstalledLibrary),
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    version: Version,
    constraint: VersionConstraint,
    binding: Binding,
}

impl Node {
    fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || sanitize_name(&self.name).eq_ignore_ascii_case(&sanitize_name(name))
    }

    fn dependencies(&self) -> Vec<Dependency> {
        match &self.binding {
            Binding::Index(release) => release.dependencies.clone(),
            Binding::Installed(lib) => lib.dependencies.clone(),
        }
    }
}

/// Computes plans against one catalog and one registry snapshot.
pub struct VersionResolver<'a> {
    catalog: &'a IndexCatalog,
    installed: &'a InstalledRegistry,
}

impl<'a> VersionResolver<'a> {
    pub fn new(catalog: &'a IndexCatalog, installed: &'a InstalledRegistry) -> Self {
        Self { catalog, installed }
    }

    /// Plan the installation of a requested library.
    pub fn resolve(&self, request: &ResolveRequest, options: ResolveOptions) -> Result<Plan> {
        let release = self
            .catalog
            .find_release(&request.name, request.version.as_deref())?;
        self.plan(release.clone(), options, Mode::Install)
    }

    /// Plan the upgrade of an installed library to its newest release.
    ///
    /// Only user and builtin copies are upgrade targets. Returns `None` when
    /// the library is not in the index.
    pub fn resolve_upgrade(&self, name: &str, options: ResolveOptions) -> Result<Option<Plan>> {
        let shared = self.installed.find_shared(name);
        let existing = match shared.as_slice() {
            [] => {
                return Err(BoardlibError::LibraryNotFound {
                    name: name.to_string(),
                })
            }
            [one] => *one,
            many => return Err(multiple_installations(name, many)),
        };

        let latest = match self.catalog.latest(&existing.name) {
            Ok(release) => release.clone(),
            Err(BoardlibError::LibraryNotFound { .. }) => {
                debug!("{} is not in the index, nothing to upgrade", existing.name);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if let Some(current) = &existing.version {
            if current > &latest.version {
                debug!("{} is newer than the index release", existing.id());
                return Ok(None);
            }
        }

        self.plan(latest, options, Mode::Upgrade).map(Some)
    }

    /// Full dependency closure of a release with installed versions: the
    /// requested library first, then the rest sorted by name.
    pub fn dependency_status(&self, request: &ResolveRequest) -> Result<Vec<DependencyStatus>> {
        let release = self
            .catalog
            .find_release(&request.name, request.version.as_deref())?;
        let nodes = self.closure(release.clone(), false)?;

        let mut rows: Vec<DependencyStatus> = nodes
            .into_iter()
            .map(|node| {
                let installed = self.installed_version(&node.name);
                DependencyStatus {
                    name: node.name,
                    version_required: node.version,
                    version_installed: installed,
                }
            })
            .collect();
        if rows.len() > 1 {
            rows[1..].sort_by_key(|r| r.name.to_lowercase());
        }
        Ok(rows)
    }

    fn installed_version(&self, name: &str) -> Option<Version> {
        let found = self.installed.find_by_name(name);
        found
            .iter()
            .find(|l| !l.location.is_platform_bundled())
            .or_else(|| found.first())
            .and_then(|l| l.version.clone())
    }

    fn plan(&self, target: LibraryRelease, options: ResolveOptions, mode: Mode) -> Result<Plan> {
        let nodes = self.closure(target, options.no_deps)?;
        let mut plan = Plan::default();

        for (index, node) in nodes.into_iter().enumerate() {
            let release = match node.binding {
                Binding::Installed(lib) => {
                    plan.satisfied.push(SatisfiedDependency {
                        name: lib.name.clone(),
                        version: node.version,
                        location: lib.location.clone(),
                    });
                    continue;
                }
                Binding::Index(release) => release,
            };

            let direct = index == 0;
            let shared = self.installed.find_shared(&release.name);
            let existing = match shared.as_slice() {
                [] => None,
                [one] => Some(*one),
                many => return Err(multiple_installations(&release.name, many)),
            };

            let action = match existing {
                None => PlanAction::Install,
                Some(lib) if lib.version.as_ref() == Some(&release.version) => {
                    PlanAction::AlreadyInstalled
                }
                Some(lib) => PlanAction::Upgrade {
                    from: lib.version.clone(),
                },
            };

            let scope = match existing {
                Some(lib) if !(direct && mode == Mode::Install) => {
                    InstallScope::from_location(&lib.location).unwrap_or(options.scope)
                }
                _ => options.scope,
            };

            if let Some(lib) = existing {
                let existing_scope = InstallScope::from_location(&lib.location);
                if action != PlanAction::AlreadyInstalled && existing_scope != Some(scope) {
                    // Placing into the other shared directory would leave two copies.
                    return Err(BoardlibError::MultipleInstallations {
                        name: release.name.clone(),
                        locations: vec![
                            lib.path.display().to_string(),
                            format!("{} directory", scope),
                        ],
                    });
                }
                if options.no_overwrite && matches!(action, PlanAction::Upgrade { .. }) {
                    return Err(BoardlibError::OverwriteRefused {
                        name: release.name.clone(),
                        installed: lib
                            .raw_version
                            .clone()
                            .unwrap_or_else(|| "unknown".to_string()),
                    });
                }
            }

            let usage = match (direct, &action, scope) {
                (false, _, _) => UsageTag::Depends,
                (true, PlanAction::Upgrade { .. }, InstallScope::User) => UsageTag::Upgrade,
                (true, PlanAction::Upgrade { .. }, InstallScope::Builtin) => UsageTag::UpgradeBuiltin,
                (true, _, InstallScope::User) => UsageTag::Install,
                (true, _, InstallScope::Builtin) => UsageTag::InstallBuiltin,
            };

            plan.entries.push(PlanEntry {
                name: release.name.clone(),
                version: release.version.clone(),
                scope,
                reason: if direct {
                    PlanReason::Direct
                } else {
                    PlanReason::TransitiveDependency
                },
                replaces: match action {
                    PlanAction::Upgrade { .. } => existing.map(|l| l.path.clone()),
                    _ => None,
                },
                action,
                usage,
                release: Some(release),
            });
        }

        debug!("Resolved plan:\n{}", plan);
        Ok(plan)
    }

    /// Bind every library reachable from `target`, in breadth-first order.
    fn closure(&self, target: LibraryRelease, no_deps: bool) -> Result<Vec<Node>> {
        let mut pins: HashMap<String, VersionConstraint> = HashMap::new();
        loop {
            match self.expand(&target, no_deps, &pins)? {
                Expansion::Complete(nodes) => return Ok(nodes),
                Expansion::Narrowed { name, constraint } => {
                    debug!("Re-binding {} within {}", name, constraint);
                    pins.insert(pin_key(&name), constraint);
                }
            }
        }
    }

    fn expand(
        &self,
        target: &LibraryRelease,
        no_deps: bool,
        pins: &HashMap<String, VersionConstraint>,
    ) -> Result<Expansion> {
        let mut nodes = vec![Node {
            name: target.name.clone(),
            version: target.version.clone(),
            constraint: VersionConstraint::exact(target.version.clone()),
            binding: Binding::Index(target.clone()),
        }];
        if no_deps {
            return Ok(Expansion::Complete(nodes));
        }

        let mut queue: VecDeque<(usize, Dependency)> =
            nodes[0].dependencies().into_iter().map(|d| (0, d)).collect();

        while let Some((parent, dep)) = queue.pop_front() {
            let parent_id = format!("{}@{}", nodes[parent].name, nodes[parent].version);

            if let Some(position) = nodes.iter().position(|n| n.answers_to(&dep.name)) {
                let node = &mut nodes[position];
                node.constraint = std::mem::take(&mut node.constraint).and(dep.constraint.clone());
                if node.constraint.matches(&node.version) {
                    continue;
                }
                if position == 0 {
                    return Err(BoardlibError::Unsatisfiable {
                        dependency: node.name.clone(),
                        detail: Some(format!(
                            "{} requires {} but version {} was requested",
                            parent_id, dep, node.version
                        )),
                    });
                }
                debug!(
                    "{} requires {}, {} no longer fits",
                    parent_id, dep, node.version
                );
                return Ok(Expansion::Narrowed {
                    name: node.name.clone(),
                    constraint: node.constraint.clone(),
                });
            }

            let node = self.bind(&dep, &parent_id, pins.get(&pin_key(&dep.name)))?;
            let index = nodes.len();
            queue.extend(node.dependencies().into_iter().map(|d| (index, d)));
            nodes.push(node);
        }

        Ok(Expansion::Complete(nodes))
    }

    fn bind(
        &self,
        dep: &Dependency,
        parent_id: &str,
        pin: Option<&VersionConstraint>,
    ) -> Result<Node> {
        let constraint = match pin {
            Some(pin) => dep.constraint.clone().and(pin.clone()),
            None => dep.constraint.clone(),
        };

        let mut installed = self.installed.find_by_name(&dep.name);
        // user/builtin copies before platform-bundled ones
        installed.sort_by_key(|l| l.location.is_platform_bundled());
        if let Some(lib) = installed
            .into_iter()
            .find(|l| l.version.as_ref().is_some_and(|v| constraint.matches(v)))
        {
            let version = lib.version.clone().unwrap_or_else(|| Version::new(0, 0, 0));
            debug!("{} satisfied by installed {}", dep, lib.id());
            return Ok(Node {
                name: lib.name.clone(),
                version,
                constraint,
                binding: Binding::Installed(lib.clone()),
            });
        }

        let unavailable = |detail: String| BoardlibError::Unsatisfiable {
            dependency: dep.name.clone(),
            detail: Some(detail),
        };
        let library = self
            .catalog
            .library(&dep.name)
            .ok_or_else(|| unavailable(format!("required by {}, not in the index", parent_id)))?;
        let release = library
            .releases_newest_first()
            .find(|r| constraint.matches(&r.version))
            .ok_or_else(|| {
                unavailable(format!(
                    "{} requires {}, no release satisfies {}",
                    parent_id, dep, constraint
                ))
            })?;

        Ok(Node {
            name: release.name.clone(),
            version: release.version.clone(),
            constraint,
            binding: Binding::Index(release.clone()),
        })
    }
}

enum Expansion {
    Complete(Vec<Node>),
    /// A bound dependency no longer satisfies its accumulated range.
    Narrowed {
        name: String,
        constraint: VersionConstraint,
    },
}

fn pin_key(name: &str) -> String {
    sanitize_name(name).to_lowercase()
}

pub(crate) fn multiple_installations(name: &str, libs: &[&InstalledLibrary]) -> BoardlibError {
    BoardlibError::MultipleInstallations {
        name: name.to_string(),
        locations: libs.iter().map(|l| l.path.display().to_string()).collect(),
    }
}
