//! `library.properties` parsing and library directory validation.

use crate::config::PathsConfig;
use crate::error::{BoardlibError, Result};
use crate::index::Dependency;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Parsed `library.properties`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub maintainer: Option<String>,
    pub sentence: Option<String>,
    pub paragraph: Option<String>,
    pub architectures: Vec<String>,
    pub depends: Vec<Dependency>,
    pub includes: Vec<String>,
    /// Every key, including ones without a dedicated field.
    #[serde(skip)]
    pub properties: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse `key=value` lines. Blank lines and `#` comments are ignored;
    /// malformed `depends` entries are dropped with a warning.
    pub fn parse(contents: &str) -> Self {
        let mut properties = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                properties.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let get = |key: &str| properties.get(key).filter(|v| !v.is_empty()).cloned();
        let list = |key: &str| -> Vec<String> {
            properties
                .get(key)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let depends = match properties.get("depends") {
            Some(raw) => Dependency::parse_list(raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed depends '{}': {}", raw, e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        Self {
            name: get("name"),
            version: get("version"),
            author: get("author"),
            maintainer: get("maintainer"),
            sentence: get("sentence"),
            paragraph: get("paragraph"),
            architectures: list("architectures"),
            depends,
            includes: list("includes"),
            properties,
        }
    }

    /// Read the manifest of a library directory, if it has one.
    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(PathsConfig::MANIFEST_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(Self::parse(&contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BoardlibError::io_with_path(e, path)),
        }
    }

    /// Whether the manifest declares a name or a version.
    pub fn is_declarative(&self) -> bool {
        self.name.is_some() || self.version.is_some()
    }
}

/// What a library directory looks like on disk.
#[derive(Debug, Clone, Default)]
pub struct LibraryContents {
    pub manifest: Option<Manifest>,
    /// Header files under `src/`.
    pub source_headers: Vec<String>,
    /// Header files at the directory root (legacy layout).
    pub root_headers: Vec<String>,
}

impl LibraryContents {
    pub fn inspect(dir: &Path) -> Result<Self> {
        Ok(Self {
            manifest: Manifest::read(dir)?,
            source_headers: headers_in(&dir.join(PathsConfig::SOURCE_DIR)),
            root_headers: headers_in(dir),
        })
    }

    /// Installable content: a manifest declaring name or version, or a
    /// header under `src/`.
    pub fn is_installable(&self) -> bool {
        self.manifest.as_ref().is_some_and(Manifest::is_declarative)
            || !self.source_headers.is_empty()
    }

    /// Usable when already installed; legacy root headers also count.
    pub fn is_valid(&self) -> bool {
        self.is_installable() || !self.root_headers.is_empty()
    }

    /// Declared includes, falling back to the headers found on disk.
    pub fn provides_includes(&self) -> Vec<String> {
        match &self.manifest {
            Some(m) if !m.includes.is_empty() => m.includes.clone(),
            _ if !self.source_headers.is_empty() => self.source_headers.clone(),
            _ => self.root_headers.clone(),
        }
    }
}

/// Check that a staged directory holds an installable library.
pub fn validate_library_dir(dir: &Path) -> Result<LibraryContents> {
    if !dir.is_dir() {
        return Err(BoardlibError::invalid_library("not a directory", dir));
    }
    let contents = LibraryContents::inspect(dir)?;
    if !contents.is_installable() {
        return Err(BoardlibError::invalid_library(
            format!(
                "no {} declaring a name or version and no header files in {}/",
                PathsConfig::MANIFEST_FILE,
                PathsConfig::SOURCE_DIR
            ),
            dir,
        ));
    }
    Ok(contents)
}

/// Sorted header file names directly inside `dir`.
fn headers_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut headers: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|e| {
            let path = e.path();
            let ext = path.extension()?.to_str()?.to_ascii_lowercase();
            PathsConfig::HEADER_EXTENSIONS
                .contains(&ext.as_str())
                .then(|| e.file_name().to_string_lossy().into_owned())
        })
        .collect();
    headers.sort();
    headers
}
