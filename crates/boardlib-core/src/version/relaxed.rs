//! Relaxed semantic versions.
//!
//! Library authors publish versions like `1`, `1.0` or `v2.3.1-beta`. They are
//! normalized by padding the missing components with zeros, so `1`, `1.0` and
//! `1.0.0` compare equal. The literal is kept for display.

use crate::error::{BoardlibError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A version parsed with relaxed rules.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    semver: semver::Version,
}

impl Version {
    /// Parse a relaxed version literal.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        let invalid = |message: &str| BoardlibError::InvalidVersion {
            version: input.to_string(),
            message: message.to_string(),
        };

        let body = raw
            .strip_prefix('v')
            .or_else(|| raw.strip_prefix('V'))
            .unwrap_or(raw);
        if body.is_empty() {
            return Err(invalid("empty version"));
        }

        let split_at = body.find(['-', '+']).unwrap_or(body.len());
        let (core, suffix) = body.split_at(split_at);

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(invalid("too many components"));
        }
        for part in &parts {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("components must be numeric"));
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(invalid("leading zero in numeric component"));
            }
        }

        let mut padded = parts.join(".");
        for _ in parts.len()..3 {
            padded.push_str(".0");
        }
        padded.push_str(suffix);

        let semver = semver::Version::parse(&padded).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            raw: raw.to_string(),
            semver,
        })
    }

    /// Build a version from numeric components.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        let semver = semver::Version::new(major, minor, patch);
        Self {
            raw: semver.to_string(),
            semver,
        }
    }

    /// The literal as it was written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Fully padded `major.minor.patch[-pre][+build]` form.
    pub fn normalized(&self) -> String {
        self.semver.to_string()
    }

    pub fn semver(&self) -> &semver::Version {
        &self.semver
    }

    pub fn major(&self) -> u64 {
        self.semver.major
    }

    pub fn minor(&self) -> u64 {
        self.semver.minor
    }

    pub fn patch(&self) -> u64 {
        self.semver.patch
    }

    pub fn is_prerelease(&self) -> bool {
        !self.semver.pre.is_empty()
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.semver == other.semver
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.semver.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.semver.cmp(&other.semver)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = BoardlibError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
