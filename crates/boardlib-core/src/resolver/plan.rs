//! Resolution plans.

use crate::index::{LibraryRelease, UsageTag};
use crate::registry::LibraryLocation;
use crate::version::Version;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Destination directory class for new installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallScope {
    #[default]
    User,
    Builtin,
}

impl InstallScope {
    pub fn location(&self) -> LibraryLocation {
        match self {
            InstallScope::User => LibraryLocation::User,
            InstallScope::Builtin => LibraryLocation::Builtin,
        }
    }

    /// Scope of an installed entry; platform-bundled locations have none.
    pub fn from_location(location: &LibraryLocation) -> Option<Self> {
        match location {
            LibraryLocation::User => Some(InstallScope::User),
            LibraryLocation::Builtin => Some(InstallScope::Builtin),
            LibraryLocation::PlatformBundled { .. } => None,
        }
    }
}

impl fmt::Display for InstallScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location())
    }
}

/// Why an entry is in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanReason {
    Direct,
    TransitiveDependency,
}

/// What applying an entry does to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlanAction {
    /// Nothing of that name is installed.
    Install,
    /// Replace an installed copy at a different (or unknown) version.
    Upgrade { from: Option<Version> },
    /// The requested version is already in place.
    AlreadyInstalled,
}

/// One step of a plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub name: String,
    pub version: Version,
    pub scope: InstallScope,
    pub reason: PlanReason,
    pub action: PlanAction,
    /// Installed directory this entry replaces.
    pub replaces: Option<PathBuf>,
    pub usage: UsageTag,
    /// Index release to acquire.
    #[serde(skip)]
    pub release: Option<LibraryRelease>,
}

impl PlanEntry {
    /// Whether applying this entry touches the filesystem.
    pub fn is_mutation(&self) -> bool {
        self.action != PlanAction::AlreadyInstalled
    }

    /// `name@version`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// A dependency already satisfied by an installed copy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SatisfiedDependency {
    pub name: String,
    pub version: Version,
    pub location: LibraryLocation,
}

/// Ordered install/upgrade steps. Names are unique; the direct target is
/// always first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    pub satisfied: Vec<SatisfiedDependency>,
}

impl Plan {
    /// Entries that touch the filesystem.
    pub fn mutations(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.is_mutation())
    }

    /// True when applying the plan changes nothing.
    pub fn is_noop(&self) -> bool {
        self.mutations().next().is_none()
    }

    pub fn entry(&self, name: &str) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            match &entry.action {
                PlanAction::Install => writeln!(f, "install {} ({})", entry.id(), entry.scope)?,
                PlanAction::Upgrade { from: Some(from) } => {
                    writeln!(f, "replace {}@{} with {} ({})", entry.name, from, entry.version, entry.scope)?
                }
                PlanAction::Upgrade { from: None } => {
                    writeln!(f, "replace {} with {} ({})", entry.name, entry.version, entry.scope)?
                }
                PlanAction::AlreadyInstalled => writeln!(f, "{} already installed", entry.id())?,
            }
        }
        for dep in &self.satisfied {
            writeln!(f, "{}@{} satisfied by {} copy", dep.name, dep.version, dep.location)?;
        }
        Ok(())
    }
}
