//! Centralized configuration for boardlib.
//!
//! Constant groups hold file names, timeouts and environment variable names.
//! `EngineConfig` holds the per-instance directory layout and opt-in flags;
//! nothing here is process-global.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "boardlib";
    pub const USER_AGENT: &'static str = concat!("boardlib/", env!("CARGO_PKG_VERSION"));
}

/// Configuration for installation and placement.
pub struct InstallConfig;

impl InstallConfig {
    /// Environment variable that enables git/zip/local installs.
    pub const UNSAFE_INSTALL_ENV: &'static str = "BOARDLIB_ENABLE_UNSAFE_INSTALL";
    /// Advisory surfaced on every successful untrusted install.
    pub const UNSAFE_INSTALL_ADVISORY: &'static str =
        "--git-url and --zip-path flags allow installing untrusted files, use it at your own risk.";
    /// Prefix for staging and backup directories created next to a destination.
    pub const STAGING_PREFIX: &'static str = ".boardlib-staging-";
    pub const BACKUP_PREFIX: &'static str = ".boardlib-backup-";
    pub const GIT_TIMEOUT: Duration = Duration::from_secs(300);
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    /// Query parameter carrying the usage tag on artifact URLs.
    pub const USAGE_QUERY_KEY: &'static str = "query";
}

/// Library layout conventions.
pub struct PathsConfig;

impl PathsConfig {
    pub const MANIFEST_FILE: &'static str = "library.properties";
    pub const SOURCE_DIR: &'static str = "src";
    pub const HEADER_EXTENSIONS: &'static [&'static str] = &["h", "hpp", "hh"];
    pub const STAGING_DIR: &'static str = "staging";
    pub const DOWNLOADS_SUBDIR: &'static str = "libraries";
    pub const SETTINGS_FILE: &'static str = "boardlib.json";
    pub const INDEX_FILE: &'static str = "library_index.json";
}

/// Libraries bundled with one installed hardware platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformLibraries {
    /// Platform identifier in `vendor:architecture` form (e.g. `arduino:avr`).
    pub platform_id: String,
    /// Directory holding the platform's bundled libraries.
    pub path: PathBuf,
}

impl PlatformLibraries {
    pub fn new(platform_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            platform_id: platform_id.into(),
            path: path.into(),
        }
    }

    /// Architecture part of the platform identifier.
    pub fn architecture(&self) -> &str {
        self.platform_id
            .split_once(':')
            .map(|(_, arch)| arch)
            .unwrap_or(&self.platform_id)
    }
}

/// Per-instance engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// User (sketchbook) library directory.
    pub user_dir: PathBuf,
    /// Optional builtin override directory.
    #[serde(default)]
    pub builtin_dir: Option<PathBuf>,
    /// Platform-bundled library directories, one per installed platform.
    #[serde(default)]
    pub platforms: Vec<PlatformLibraries>,
    /// Download cache root; archives land in `<download_dir>/libraries`.
    pub download_dir: PathBuf,
    /// Explicit opt-in for git/zip/local sources.
    #[serde(default)]
    pub unsafe_install: bool,
}

impl EngineConfig {
    /// Create a configuration with only a user directory.
    ///
    /// The download cache defaults to a `staging` sibling of the user
    /// directory.
    pub fn new(user_dir: impl Into<PathBuf>) -> Self {
        let user_dir = user_dir.into();
        let download_dir = user_dir
            .parent()
            .map(|p| p.join(PathsConfig::STAGING_DIR))
            .unwrap_or_else(|| user_dir.join(".staging"));
        Self {
            user_dir,
            builtin_dir: None,
            platforms: Vec::new(),
            download_dir,
            unsafe_install: false,
        }
    }

    /// Directory where index archives are cached.
    pub fn library_downloads_dir(&self) -> PathBuf {
        self.download_dir.join(PathsConfig::DOWNLOADS_SUBDIR)
    }

    /// Find the platform entry for a `vendor:architecture` identifier.
    pub fn platform(&self, platform_id: &str) -> Option<&PlatformLibraries> {
        self.platforms
            .iter()
            .find(|p| p.platform_id.eq_ignore_ascii_case(platform_id))
    }

    /// Whether untrusted sources are enabled by any opt-in channel.
    ///
    /// The explicit flag, the environment variable and the persisted setting
    /// are each sufficient on their own.
    pub fn unsafe_install_enabled(&self, persisted: bool) -> bool {
        self.unsafe_install || persisted || unsafe_install_from_env()
    }
}

/// Read the unsafe-install opt-in from the environment.
pub fn unsafe_install_from_env() -> bool {
    std::env::var(InstallConfig::UNSAFE_INSTALL_ENV)
        .map(|v| parse_bool(&v))
        .unwrap_or(false)
}

/// Lenient boolean parsing for environment values.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Default settings file location inside a data directory.
pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join(PathsConfig::SETTINGS_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" YES "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_default_download_dir() {
        let config = EngineConfig::new("/home/u/Arduino/libraries");
        assert_eq!(config.download_dir, PathBuf::from("/home/u/Arduino/staging"));
        assert_eq!(
            config.library_downloads_dir(),
            PathBuf::from("/home/u/Arduino/staging/libraries")
        );
    }

    #[test]
    fn test_platform_lookup_is_case_insensitive() {
        let mut config = EngineConfig::new("/tmp/libs");
        config
            .platforms
            .push(PlatformLibraries::new("arduino:avr", "/tmp/avr/libraries"));
        assert!(config.platform("Arduino:AVR").is_some());
        assert!(config.platform("arduino:samd").is_none());
        assert_eq!(config.platforms[0].architecture(), "avr");
    }

    #[test]
    fn test_explicit_flag_enables_unsafe_install() {
        let mut config = EngineConfig::new("/tmp/libs");
        config.unsafe_install = true;
        assert!(config.unsafe_install_enabled(false));
    }
}
