//! Results of applying a plan.

use crate::error::BoardlibError;
use crate::resolver::Plan;
use crate::version::Version;
use serde::Serialize;
use std::path::PathBuf;

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum EntryStatus {
    Installed,
    Upgraded { from: Option<Version> },
    AlreadyInstalled,
    Failed { error: String, code: i32 },
}

impl EntryStatus {
    pub fn failed(error: &BoardlibError) -> Self {
        EntryStatus::Failed {
            error: error.to_string(),
            code: error.error_code(),
        }
    }

    /// Whether this entry changed the filesystem.
    pub fn is_placed(&self) -> bool {
        matches!(self, EntryStatus::Installed | EntryStatus::Upgraded { .. })
    }
}

/// Outcome of one plan entry or one untrusted source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutcome {
    pub name: String,
    pub version: Option<Version>,
    /// Final directory, for placed entries.
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub status: EntryStatus,
}

/// Report of an install, upgrade or untrusted-source install.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub plan: Plan,
    pub outcomes: Vec<EntryOutcome>,
    /// Notices the caller should display, such as the untrusted-source
    /// warning.
    pub advisories: Vec<String>,
}

impl InstallReport {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            ..Default::default()
        }
    }

    /// Entries that were placed on disk.
    pub fn placed(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_placed())
    }

    /// The entry that stopped the run, if any.
    pub fn failure(&self) -> Option<&EntryOutcome> {
        self.outcomes
            .iter()
            .find(|o| matches!(o.status, EntryStatus::Failed { .. }))
    }

    /// True when nothing was changed and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.failure().is_none() && self.placed().next().is_none()
    }

    pub(crate) fn merge(&mut self, other: InstallReport) {
        self.plan.entries.extend(other.plan.entries);
        self.plan.satisfied.extend(other.plan.satisfied);
        self.outcomes.extend(other.outcomes);
        for advisory in other.advisories {
            if !self.advisories.contains(&advisory) {
                self.advisories.push(advisory);
            }
        }
    }
}
