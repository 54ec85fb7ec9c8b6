use super::{Acquirer, StagedLibrary};
use crate::cancel::CancellationToken;
use crate::error::{BoardlibError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Uses an existing directory as-is. Placement copies it; the source is
/// never moved or modified.
pub struct LocalDirAcquirer {
    path: PathBuf,
}

impl LocalDirAcquirer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Acquirer for LocalDirAcquirer {
    async fn acquire(&self, _staging_root: &Path, cancel: &CancellationToken) -> Result<StagedLibrary> {
        cancel.check()?;
        let path = std::path::absolute(&self.path).map_err(|e| BoardlibError::io_with_path(e, &self.path))?;
        let fallback = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "library".to_string());
        StagedLibrary::validate(path.clone(), None, &fallback, path.display().to_string(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_declared_name_wins() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("checkout");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("library.properties"), "name=Sensor Kit\nversion=1.0.1\n").unwrap();

        let staged = LocalDirAcquirer::new(dir)
            .acquire(temp.path(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(staged.name, "Sensor Kit");
    }

    #[tokio::test]
    async fn test_invalid_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("docs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("README.md"), "").unwrap();

        let err = LocalDirAcquirer::new(dir)
            .acquire(temp.path(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BoardlibError::InvalidLibrary { .. }));
    }
}
