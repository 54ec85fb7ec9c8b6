//! Release records and dependency edges.

use crate::config::NetworkConfig;
use crate::error::{BoardlibError, Result};
use crate::network::{Checksum, Integrity};
use crate::version::{Version, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dependency edge: library name plus accepted versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(rename = "version", default)]
    pub constraint: VersionConstraint,
}

impl Dependency {
    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Parse a single `Name` or `Name (constraint)` entry.
    pub fn parse(entry: &str) -> Result<Self> {
        let entry = entry.trim();
        let (name, constraint) = match entry.find('(') {
            Some(open) => {
                let rest = &entry[open + 1..];
                let close = rest.rfind(')').ok_or_else(|| BoardlibError::InvalidConstraint {
                    constraint: entry.to_string(),
                    message: "missing closing parenthesis".to_string(),
                })?;
                if !rest[close + 1..].trim().is_empty() {
                    return Err(BoardlibError::InvalidConstraint {
                        constraint: entry.to_string(),
                        message: "unexpected text after constraint".to_string(),
                    });
                }
                (&entry[..open], VersionConstraint::parse(&rest[..close])?)
            }
            None => (entry, VersionConstraint::Any),
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(BoardlibError::InvalidConstraint {
                constraint: entry.to_string(),
                message: "missing library name".to_string(),
            });
        }
        Ok(Self::new(name, constraint))
    }

    /// Parse a comma separated `depends=` list.
    ///
    /// Commas inside parentheses do not split entries. When a name appears
    /// twice the last entry wins.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        let mut entries = Vec::new();
        let mut depth = 0usize;
        let mut start = 0;
        for (i, c) in list.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    entries.push(&list[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        entries.push(&list[start..]);

        let mut deps = Vec::new();
        for entry in entries.into_iter().filter(|e| !e.trim().is_empty()) {
            deps.push(Self::parse(entry)?);
        }
        Ok(dedup_last_wins(deps))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraint.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.constraint)
        }
    }
}

/// Keep one edge per dependency name, the last declared one, in first-seen order.
pub(crate) fn dedup_last_wins(deps: Vec<Dependency>) -> Vec<Dependency> {
    let mut out: Vec<Dependency> = Vec::with_capacity(deps.len());
    for dep in deps {
        match out.iter_mut().find(|d| d.name.eq_ignore_ascii_case(&dep.name)) {
            Some(existing) => *existing = dep,
            None => out.push(dep),
        }
    }
    out
}

/// Downloadable archive of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub url: String,
    pub archive_file_name: String,
    #[serde(default)]
    pub size: Option<u64>,
    /// `SHA-256:<hex>`.
    #[serde(default)]
    pub checksum: Option<String>,
}

impl Resource {
    /// Size and checksum the downloaded archive must match.
    pub fn integrity(&self) -> Result<Integrity> {
        Ok(Integrity {
            size: self.size,
            checksum: self.checksum.as_deref().map(Checksum::parse).transpose()?,
        })
    }
}

/// Why an artifact is being fetched. Sent as a query parameter for server
/// statistics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UsageTag {
    Install,
    Upgrade,
    InstallBuiltin,
    UpgradeBuiltin,
    Depends,
    Download,
}

impl UsageTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageTag::Install => "install",
            UsageTag::Upgrade => "upgrade",
            UsageTag::InstallBuiltin => "install-builtin",
            UsageTag::UpgradeBuiltin => "upgrade-builtin",
            UsageTag::Depends => "depends",
            UsageTag::Download => "download",
        }
    }
}

impl fmt::Display for UsageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published version of a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryRelease {
    pub name: String,
    pub version: Version,
    pub author: String,
    pub maintainer: String,
    pub sentence: String,
    pub paragraph: String,
    pub website: String,
    pub category: String,
    pub architectures: Vec<String>,
    pub types: Vec<String>,
    pub repository: String,
    pub provides_includes: Vec<String>,
    pub dependencies: Vec<Dependency>,
    #[serde(flatten)]
    pub resource: Option<Resource>,
}

impl LibraryRelease {
    /// Minimal release, used by tests and programmatic catalogs.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            author: String::new(),
            maintainer: String::new(),
            sentence: String::new(),
            paragraph: String::new(),
            website: String::new(),
            category: String::new(),
            architectures: vec!["*".to_string()],
            types: Vec::new(),
            repository: String::new(),
            provides_includes: Vec::new(),
            dependencies: Vec::new(),
            resource: None,
        }
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self.dependencies = dedup_last_wins(std::mem::take(&mut self.dependencies));
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_architectures(mut self, architectures: &[&str]) -> Self {
        self.architectures = architectures.iter().map(|a| a.to_string()).collect();
        self
    }

    /// `name@version`.
    pub fn id(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }

    /// Download URL carrying the usage tag.
    pub fn artifact_url(&self, usage: UsageTag) -> Result<String> {
        let resource = self.resource.as_ref().ok_or_else(|| BoardlibError::DownloadFailed {
            url: String::new(),
            message: format!("release {} has no downloadable resource", self.id()),
        })?;

        let mut url = url::Url::parse(&resource.url).map_err(|e| BoardlibError::DownloadFailed {
            url: resource.url.clone(),
            message: format!("invalid URL: {}", e),
        })?;
        url.query_pairs_mut()
            .append_pair(NetworkConfig::USAGE_QUERY_KEY, usage.as_str());
        Ok(url.to_string())
    }
}

/// Directory-safe form of a library name: characters outside
/// `[A-Za-z0-9_.-]` become `_`.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Index JSON shape of a release.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRelease {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub maintainer: String,
    #[serde(default)]
    pub sentence: String,
    #[serde(default)]
    pub paragraph: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub provides_includes: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<RawDependency>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub archive_file_name: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawDependency {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

impl TryFrom<RawRelease> for LibraryRelease {
    type Error = BoardlibError;

    fn try_from(raw: RawRelease) -> Result<Self> {
        let version = Version::parse(&raw.version)?;
        let mut dependencies = Vec::with_capacity(raw.dependencies.len());
        for dep in raw.dependencies {
            dependencies.push(Dependency::new(
                dep.name,
                VersionConstraint::parse(&dep.version)?,
            ));
        }

        let resource = match (raw.url, raw.archive_file_name) {
            (Some(url), archive) => {
                let archive_file_name = archive
                    .filter(|a| !a.is_empty())
                    .or_else(|| url.rsplit('/').next().map(str::to_string))
                    .unwrap_or_else(|| format!("{}-{}.zip", sanitize_name(&raw.name), version));
                Some(Resource {
                    url,
                    archive_file_name,
                    size: raw.size,
                    checksum: raw.checksum,
                })
            }
            (None, _) => None,
        };

        Ok(Self {
            name: raw.name,
            version,
            author: raw.author,
            maintainer: raw.maintainer,
            sentence: raw.sentence,
            paragraph: raw.paragraph,
            website: raw.website,
            category: raw.category,
            architectures: if raw.architectures.is_empty() {
                vec!["*".to_string()]
            } else {
                raw.architectures
            },
            types: raw.types,
            repository: raw.repository,
            provides_includes: raw.provides_includes,
            dependencies: dedup_last_wins(dependencies),
            resource,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_depends_list() {
        let deps =
            Dependency::parse_list("ArduinoJson (>=6.0.0), Servo ,Adafruit GFX Library (>=1.0 && <2.0)")
                .unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "ArduinoJson");
        assert_eq!(deps[1].name, "Servo");
        assert!(deps[1].constraint.is_any());
        assert_eq!(deps[2].name, "Adafruit GFX Library");
        assert!(deps[2].constraint.matches(&Version::parse("1.5").unwrap()));
    }

    #[test]
    fn test_duplicate_dependency_last_wins() {
        let deps = Dependency::parse_list("B (>=1.0), C, b (<1.0)").unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "b");
        assert!(deps[0].constraint.matches(&Version::parse("0.5").unwrap()));
    }

    #[test]
    fn test_parse_depends_rejects_garbage() {
        assert!(Dependency::parse("(>=1.0)").is_err());
        assert!(Dependency::parse("Foo (>=1.0").is_err());
        assert!(Dependency::parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_artifact_url_carries_usage_tag() {
        let release = LibraryRelease::new("Servo", Version::parse("1.1.8").unwrap()).with_resource(
            Resource {
                url: "https://downloads.example.com/libraries/Servo-1.1.8.zip".into(),
                archive_file_name: "Servo-1.1.8.zip".into(),
                size: None,
                checksum: None,
            },
        );
        assert_eq!(
            release.artifact_url(UsageTag::UpgradeBuiltin).unwrap(),
            "https://downloads.example.com/libraries/Servo-1.1.8.zip?query=upgrade-builtin"
        );
        assert!(LibraryRelease::new("X", Version::new(1, 0, 0))
            .artifact_url(UsageTag::Install)
            .is_err());
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(
            sanitize_name("Arduino SigFox for MKRFox1200"),
            "Arduino_SigFox_for_MKRFox1200"
        );
        assert_eq!(sanitize_name("Foo-Bar_1.0"), "Foo-Bar_1.0");
    }

    #[test]
    fn test_raw_release_conversion() {
        let raw: RawRelease = serde_json::from_str(
            r#"{
                "name": "A",
                "version": "1.0",
                "dependencies": [{"name": "B", "version": ">=1.0"}, {"name": "C"}],
                "url": "https://example.com/A-1.0.zip",
                "size": 10,
                "checksum": "SHA-256:00"
            }"#,
        )
        .unwrap();
        let release = LibraryRelease::try_from(raw).unwrap();
        assert_eq!(release.architectures, vec!["*"]);
        assert_eq!(release.dependencies.len(), 2);
        let resource = release.resource.unwrap();
        assert_eq!(resource.archive_file_name, "A-1.0.zip");
        assert_eq!(resource.size, Some(10));
    }
}
