//! Error types for boardlib.
//!
//! Every error names the entity it is about (library, dependency, path or URL)
//! so callers can surface it to users verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the boardlib engine.
#[derive(Debug, Error)]
pub enum BoardlibError {
    // Index lookups
    #[error("Library '{name}' not found")]
    LibraryNotFound { name: String },

    #[error("Release '{name}@{version}' not found")]
    ReleaseNotFound { name: String, version: String },

    #[error("Library '{name}' is not installed")]
    NotInstalled { name: String },

    // Resolution
    #[error("No valid dependencies solution found: dependency '{dependency}' is not available")]
    Unsatisfiable {
        dependency: String,
        /// Human readable description of the constraints that could not be met.
        detail: Option<String>,
    },

    // Installed registry conflicts
    #[error("The library {name} has multiple installations: {}", locations.join(", "))]
    MultipleInstallations {
        name: String,
        locations: Vec<String>,
    },

    #[error("Library '{name}' is already installed at version {installed}, refusing to overwrite")]
    OverwriteRefused { name: String, installed: String },

    #[error("Library '{name}' is bundled with platform {platform} and cannot be modified")]
    PlatformBundled { name: String, platform: String },

    // Staged content validation
    #[error("library not valid: {reason}")]
    InvalidLibrary { reason: String, path: Option<PathBuf> },

    #[error(
        "--git-url and --zip-path are disabled by default, for more information see: \
         the `library.enable_unsafe_install` setting or the {env_var} environment variable"
    )]
    UnsafeInstallDisabled { env_var: &'static str },

    // Versions and boards
    #[error("Invalid version '{version}': {message}")]
    InvalidVersion { version: String, message: String },

    #[error("Invalid version constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },

    #[error("Invalid FQBN '{fqbn}': {message}")]
    InvalidFqbn { fqbn: String, message: String },

    #[error("Unknown FQBN: platform {platform} is not installed")]
    UnknownPlatform { platform: String },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for {file}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        file: String,
        expected: u64,
        actual: u64,
    },

    // Version control
    #[error("Git operation failed for {url}: {message}")]
    Git { url: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Archive error for {path}: {message}")]
    Archive { path: PathBuf, message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for boardlib operations.
pub type Result<T> = std::result::Result<T, BoardlibError>;

impl From<std::io::Error> for BoardlibError {
    fn from(err: std::io::Error) -> Self {
        BoardlibError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BoardlibError {
    fn from(err: serde_json::Error) -> Self {
        BoardlibError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for BoardlibError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BoardlibError::Timeout(std::time::Duration::from_secs(0))
        } else {
            BoardlibError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl BoardlibError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        BoardlibError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an invalid-library error for a staged directory.
    pub fn invalid_library(reason: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        BoardlibError::InvalidLibrary {
            reason: reason.into(),
            path: Some(path.into()),
        }
    }

    /// Stable numeric code for outer layers (RPC, exit codes).
    ///
    /// - 1: not found (index or installed)
    /// - 2: unsatisfiable dependency graph
    /// - 3: conflicting installations
    /// - 4: invalid package content
    /// - 5: untrusted source disabled
    /// - 6: overwrite refused
    /// - 7: network / filesystem failure
    /// - 8: cancelled
    /// - 9: invalid input (versions, constraints, boards)
    pub fn error_code(&self) -> i32 {
        match self {
            BoardlibError::LibraryNotFound { .. }
            | BoardlibError::ReleaseNotFound { .. }
            | BoardlibError::NotInstalled { .. }
            | BoardlibError::UnknownPlatform { .. } => 1,

            BoardlibError::Unsatisfiable { .. } => 2,

            BoardlibError::MultipleInstallations { .. }
            | BoardlibError::PlatformBundled { .. } => 3,

            BoardlibError::InvalidLibrary { .. }
            | BoardlibError::ChecksumMismatch { .. }
            | BoardlibError::SizeMismatch { .. }
            | BoardlibError::Archive { .. } => 4,

            BoardlibError::UnsafeInstallDisabled { .. } => 5,

            BoardlibError::OverwriteRefused { .. } => 6,

            BoardlibError::Network { .. }
            | BoardlibError::Timeout(_)
            | BoardlibError::DownloadFailed { .. }
            | BoardlibError::Git { .. }
            | BoardlibError::Io { .. } => 7,

            BoardlibError::Cancelled => 8,

            BoardlibError::InvalidVersion { .. }
            | BoardlibError::InvalidConstraint { .. }
            | BoardlibError::InvalidFqbn { .. } => 9,

            _ => 10,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BoardlibError::Network { .. } | BoardlibError::Timeout(_)
        )
    }
}
