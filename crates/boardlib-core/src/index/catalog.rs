//! The library index catalog.
//!
//! Built once from the index document and read-only afterwards. Names are
//! matched case-insensitively, and also through their directory-style alias
//! (`Arduino SigFox for MKRFox1200` is reachable as
//! `Arduino_SigFox_for_MKRFox1200`).

use super::release::{sanitize_name, LibraryRelease, RawRelease};
use crate::error::{BoardlibError, Result};
use crate::version::Version;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// All releases of one library, ordered by version.
#[derive(Debug, Clone)]
pub struct Library {
    name: String,
    releases: BTreeMap<Version, LibraryRelease>,
}

impl Library {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Newest release.
    pub fn latest(&self) -> Option<&LibraryRelease> {
        self.releases.values().next_back()
    }

    /// Release whose normalized version equals `version`.
    pub fn release(&self, version: &Version) -> Option<&LibraryRelease> {
        self.releases.get(version)
    }

    /// Releases from newest to oldest.
    pub fn releases_newest_first(&self) -> impl Iterator<Item = &LibraryRelease> {
        self.releases.values().rev()
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.releases.keys()
    }
}

#[derive(Debug, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    libraries: Vec<RawRelease>,
}

/// Known libraries and their releases.
#[derive(Debug, Clone, Default)]
pub struct IndexCatalog {
    /// Keyed by lowercase name.
    libraries: HashMap<String, Library>,
    /// Lowercase sanitized name to lowercase name.
    aliases: HashMap<String, String>,
}

impl IndexCatalog {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the index from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| BoardlibError::io_with_path(e, path))?;
        let catalog = Self::from_json(&contents).map_err(|e| match e {
            BoardlibError::Json { message, source } => BoardlibError::Json {
                message: format!("Failed to parse {}: {}", path.display(), message),
                source,
            },
            other => other,
        })?;
        info!(
            "Loaded library index from {} ({} libraries)",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Parse an index document.
    ///
    /// Releases with an unparsable version or dependency are skipped with a
    /// warning rather than failing the whole index.
    pub fn from_json(contents: &str) -> Result<Self> {
        let document: IndexDocument = serde_json::from_str(contents)?;
        let mut releases = Vec::with_capacity(document.libraries.len());
        for raw in document.libraries {
            let id = format!("{}@{}", raw.name, raw.version);
            match LibraryRelease::try_from(raw) {
                Ok(release) => releases.push(release),
                Err(e) => warn!("Skipping index entry {}: {}", id, e),
            }
        }
        Ok(Self::from_releases(releases))
    }

    /// Build a catalog from release records.
    pub fn from_releases(releases: impl IntoIterator<Item = LibraryRelease>) -> Self {
        let mut catalog = Self::default();
        for release in releases {
            let key = release.name.to_lowercase();
            let alias = sanitize_name(&release.name).to_lowercase();
            if alias != key {
                catalog.aliases.entry(alias).or_insert_with(|| key.clone());
            }

            let library = catalog.libraries.entry(key).or_insert_with(|| Library {
                name: release.name.clone(),
                releases: BTreeMap::new(),
            });
            if library.releases.contains_key(&release.version) {
                debug!("Duplicate index entry {}, keeping the last", release.id());
            }
            library.releases.insert(release.version.clone(), release);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Look up a library by name or directory alias, ignoring case.
    pub fn library(&self, name: &str) -> Option<&Library> {
        let key = name.trim().to_lowercase();
        self.libraries.get(&key).or_else(|| {
            self.aliases
                .get(&key)
                .or_else(|| self.aliases.get(&sanitize_name(&key)))
                .and_then(|canonical| self.libraries.get(canonical))
        })
    }

    /// All libraries, sorted by name.
    pub fn libraries(&self) -> Vec<&Library> {
        let mut all: Vec<&Library> = self.libraries.values().collect();
        all.sort_by_key(|l| l.name.to_lowercase());
        all
    }

    /// Find a release. An empty or absent selector picks the newest; any
    /// other selector is parsed as a relaxed version and must equal a
    /// release's normalized version.
    pub fn find_release(&self, name: &str, version: Option<&str>) -> Result<&LibraryRelease> {
        let library = self
            .library(name)
            .ok_or_else(|| BoardlibError::LibraryNotFound {
                name: name.to_string(),
            })?;

        match version.map(str::trim).filter(|v| !v.is_empty()) {
            None => library.latest().ok_or_else(|| BoardlibError::LibraryNotFound {
                name: name.to_string(),
            }),
            Some(selector) => {
                let wanted = Version::parse(selector)?;
                library
                    .release(&wanted)
                    .ok_or_else(|| BoardlibError::ReleaseNotFound {
                        name: library.name.clone(),
                        version: selector.to_string(),
                    })
            }
        }
    }

    /// Newest release of a library.
    pub fn latest(&self, name: &str) -> Result<&LibraryRelease> {
        self.find_release(name, None)
    }

    /// Latest release of every library whose name, sentence or paragraph
    /// contains all query terms (case-insensitive).
    pub fn search(&self, query: &str) -> Vec<&LibraryRelease> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        self.libraries()
            .into_iter()
            .filter_map(Library::latest)
            .filter(|release| {
                let haystack = format!(
                    "{}\n{}\n{}",
                    release.name, release.sentence, release.paragraph
                )
                .to_lowercase();
                terms.iter().all(|t| haystack.contains(t.as_str()))
            })
            .collect()
    }
}
