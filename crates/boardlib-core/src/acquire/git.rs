//! Git sources: remote URLs or local repositories, with an optional
//! `#ref` fragment naming a tag, branch or commit.

use super::{new_staging_dir, Acquirer, StagedLibrary};
use crate::acquire::archive::remove_dir_if_exists;
use crate::cancel::CancellationToken;
use crate::config::InstallConfig;
use crate::error::{BoardlibError, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

/// A parsed git source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSource {
    /// Remote URL or absolute local path handed to `git clone`.
    pub url: String,
    /// Ref to check out after cloning.
    pub reference: Option<String>,
}

impl GitSource {
    /// Parse `url[#ref]`. `.`, relative and absolute paths and `file://`
    /// URLs are resolved to absolute local paths.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let (location, reference) = match input.rsplit_once('#') {
            Some((location, reference)) => (location, Some(reference.to_string())),
            None => (input, None),
        };
        let reference = reference.filter(|r| !r.trim().is_empty());

        if location.is_empty() {
            return Err(BoardlibError::Git {
                url: input.to_string(),
                message: "empty git URL".to_string(),
            });
        }

        let url = if let Some(path) = file_url_path(location) {
            path.display().to_string()
        } else if looks_like_local_path(location) {
            let path = std::path::absolute(location).map_err(|e| BoardlibError::io_with_path(e, location))?;
            path.display().to_string()
        } else {
            location.to_string()
        };

        Ok(Self { url, reference })
    }

    /// Repository name: last path segment without `.git`.
    pub fn repo_name(&self) -> String {
        let url = self.url.trim_end_matches(['/', '\\']);
        let name = url.rsplit(['/', '\\']).next().unwrap_or(url);
        let name = name.rsplit(':').next().unwrap_or(name);
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() || name == "." {
            "library".to_string()
        } else {
            name.to_string()
        }
    }
}

fn file_url_path(location: &str) -> Option<PathBuf> {
    if !location.starts_with("file://") {
        return None;
    }
    url::Url::parse(location).ok()?.to_file_path().ok()
}

fn looks_like_local_path(location: &str) -> bool {
    if location.contains("://") || location.starts_with("git@") {
        return false;
    }
    location == "."
        || location.starts_with("./")
        || location.starts_with("../")
        || Path::new(location).is_absolute()
        || Path::new(location).exists()
}

/// Clones a repository into staging and strips its `.git` directory.
pub struct GitAcquirer {
    source: GitSource,
}

impl GitAcquirer {
    pub fn new(source: GitSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Acquirer for GitAcquirer {
    async fn acquire(&self, staging_root: &Path, cancel: &CancellationToken) -> Result<StagedLibrary> {
        cancel.check()?;
        let staging = new_staging_dir(staging_root)?;
        let target = staging.path().join(self.source.repo_name());

        info!("Cloning {}", self.source.url);
        let mut clone: Vec<OsString> = vec!["clone".into(), "--quiet".into()];
        if self.source.reference.is_none() {
            clone.extend(["--depth".into(), "1".into()]);
        }
        clone.push(self.source.url.clone().into());
        clone.push(target.clone().into_os_string());
        run_git(&self.source.url, &clone, cancel).await?;

        if let Some(reference) = &self.source.reference {
            debug!("Checking out {} in {}", reference, target.display());
            let checkout: Vec<OsString> = vec![
                "-C".into(),
                target.clone().into_os_string(),
                "checkout".into(),
                "--quiet".into(),
                reference.into(),
            ];
            run_git(&self.source.url, &checkout, cancel)
                .await
                .map_err(|e| match e {
                    BoardlibError::Git { url, message } => BoardlibError::Git {
                        url,
                        message: format!("reference '{}' not found: {}", reference, message),
                    },
                    other => other,
                })?;
        }

        remove_dir_if_exists(&target.join(".git"))?;
        StagedLibrary::validate(
            target,
            Some(staging),
            &self.source.repo_name(),
            self.source.url.clone(),
            true,
        )
    }
}

async fn run_git(url: &str, args: &[OsString], cancel: &CancellationToken) -> Result<()> {
    let mut command = Command::new("git");
    command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true);

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(BoardlibError::Cancelled),
        result = tokio::time::timeout(InstallConfig::GIT_TIMEOUT, command.output()) => match result {
            Ok(output) => output.map_err(|e| BoardlibError::Git {
                url: url.to_string(),
                message: format!("Failed to execute git: {}", e),
            })?,
            Err(_) => return Err(BoardlibError::Timeout(InstallConfig::GIT_TIMEOUT)),
        },
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BoardlibError::Git {
            url: url.to_string(),
            message: stderr.trim().to_string(),
        });
    }
    Ok(())
}
