//! Installed library discovery across the configured library directories.
//!
//! User and builtin directories share one name-space; each platform's
//! bundled directory is a name-space of its own. More than one entry for a
//! name inside one name-space is a detected conflict. It is reported, never
//! repaired.

use super::manifest::{LibraryContents, Manifest};
use crate::config::EngineConfig;
use crate::error::{BoardlibError, Result};
use crate::index::{sanitize_name, Dependency};
use crate::version::Version;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Where an installed library lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LibraryLocation {
    User,
    Builtin,
    PlatformBundled {
        #[serde(rename = "platformId")]
        platform_id: String,
    },
}

impl LibraryLocation {
    pub fn is_platform_bundled(&self) -> bool {
        matches!(self, LibraryLocation::PlatformBundled { .. })
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            LibraryLocation::User | LibraryLocation::Builtin => Namespace::Shared,
            LibraryLocation::PlatformBundled { platform_id } => {
                Namespace::Platform(platform_id.to_lowercase())
            }
        }
    }
}

impl fmt::Display for LibraryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryLocation::User => f.write_str("user"),
            LibraryLocation::Builtin => f.write_str("builtin"),
            LibraryLocation::PlatformBundled { platform_id } => write!(f, "platform:{}", platform_id),
        }
    }
}

/// Duplicate-detection name-space.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// User and builtin directories.
    Shared,
    /// One platform's bundled libraries (lowercase platform id).
    Platform(String),
}

/// One directory root searched for libraries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub root: PathBuf,
    pub location: LibraryLocation,
}

impl Scope {
    /// Scopes of a configuration, in search order.
    pub fn from_config(config: &EngineConfig) -> Vec<Scope> {
        let mut scopes = vec![Scope {
            root: config.user_dir.clone(),
            location: LibraryLocation::User,
        }];
        if let Some(builtin) = &config.builtin_dir {
            scopes.push(Scope {
                root: builtin.clone(),
                location: LibraryLocation::Builtin,
            });
        }
        scopes.extend(config.platforms.iter().map(|p| Scope {
            root: p.path.clone(),
            location: LibraryLocation::PlatformBundled {
                platform_id: p.platform_id.clone(),
            },
        }));
        scopes
    }
}

/// A library directory found on disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledLibrary {
    /// Declared name, or the directory name when the manifest has none.
    pub name: String,
    pub dir_name: String,
    pub path: PathBuf,
    /// `None` when the manifest has no parsable version.
    pub version: Option<Version>,
    /// Version literal from the manifest, even if unparsable.
    pub raw_version: Option<String>,
    pub location: LibraryLocation,
    pub valid: bool,
    pub architectures: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub provides_includes: Vec<String>,
    pub sentence: Option<String>,
}

impl InstalledLibrary {
    /// Inspect one library directory.
    pub fn from_dir(path: &Path, location: LibraryLocation) -> Result<Self> {
        let contents = LibraryContents::inspect(path)?;
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let manifest = contents.manifest.clone().unwrap_or_default();
        let Manifest {
            name,
            version: raw_version,
            architectures,
            depends,
            sentence,
            ..
        } = manifest;

        let version = raw_version.as_deref().and_then(|raw| match Version::parse(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("{}: {}", path.display(), e);
                None
            }
        });

        Ok(Self {
            name: name.unwrap_or_else(|| dir_name.clone()),
            dir_name,
            path: path.to_path_buf(),
            version,
            raw_version,
            location,
            valid: contents.is_valid(),
            architectures: if architectures.is_empty() {
                vec!["*".to_string()]
            } else {
                architectures
            },
            dependencies: depends,
            provides_includes: contents.provides_includes(),
            sentence,
        })
    }

    /// Whether `name` addresses this library: declared name, directory
    /// name or directory alias, ignoring case.
    pub fn answers_to(&self, name: &str) -> bool {
        let name = name.trim();
        self.name.eq_ignore_ascii_case(name)
            || self.dir_name.eq_ignore_ascii_case(name)
            || sanitize_name(&self.name).eq_ignore_ascii_case(&sanitize_name(name))
    }

    /// `name@version`, with `?` for an unknown version.
    pub fn id(&self) -> String {
        match &self.version {
            Some(v) => format!("{}@{}", self.name, v),
            None => format!("{}@?", self.name),
        }
    }
}

/// Snapshot of installed libraries.
#[derive(Debug, Clone, Default)]
pub struct InstalledRegistry {
    libraries: Vec<InstalledLibrary>,
}

impl InstalledRegistry {
    /// Scan every scope. Missing roots are treated as empty; hidden
    /// directories (staging and backup areas) are skipped.
    pub fn scan(scopes: &[Scope]) -> Result<Self> {
        let mut libraries = Vec::new();
        for scope in scopes {
            let entries = match std::fs::read_dir(&scope.root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Library root {} does not exist", scope.root.display());
                    continue;
                }
                Err(e) => return Err(BoardlibError::io_with_path(e, &scope.root)),
            };

            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
                .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
                .map(|e| e.path())
                .collect();
            dirs.sort();

            for dir in dirs {
                match InstalledLibrary::from_dir(&dir, scope.location.clone()) {
                    Ok(lib) => libraries.push(lib),
                    Err(e) => warn!("Skipping {}: {}", dir.display(), e),
                }
            }
        }

        debug!("Registry scan found {} libraries", libraries.len());
        Ok(Self { libraries })
    }

    pub fn from_libraries(libraries: Vec<InstalledLibrary>) -> Self {
        Self { libraries }
    }

    pub fn libraries(&self) -> &[InstalledLibrary] {
        &self.libraries
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Every installed entry answering to `name`, across all scopes.
    pub fn find_by_name(&self, name: &str) -> Vec<&InstalledLibrary> {
        self.libraries.iter().filter(|l| l.answers_to(name)).collect()
    }

    /// Entries answering to `name` within one name-space.
    pub fn find_in_namespace(&self, name: &str, namespace: &Namespace) -> Vec<&InstalledLibrary> {
        self.libraries
            .iter()
            .filter(|l| &l.location.namespace() == namespace && l.answers_to(name))
            .collect()
    }

    /// User or builtin entries answering to `name`.
    pub fn find_shared(&self, name: &str) -> Vec<&InstalledLibrary> {
        self.find_in_namespace(name, &Namespace::Shared)
    }

    /// More than one entry for `name` within the name-space.
    pub fn is_duplicate(&self, name: &str, namespace: &Namespace) -> bool {
        self.find_in_namespace(name, namespace).len() > 1
    }

    /// Every name with more than one entry in some name-space.
    pub fn duplicates(&self) -> Vec<(String, Namespace)> {
        let mut seen: Vec<(String, Namespace)> = Vec::new();
        for lib in &self.libraries {
            let namespace = lib.location.namespace();
            if seen
                .iter()
                .any(|(n, ns)| ns == &namespace && lib.answers_to(n))
            {
                continue;
            }
            if self.is_duplicate(&lib.name, &namespace) {
                seen.push((lib.name.clone(), namespace));
            }
        }
        seen
    }
}
