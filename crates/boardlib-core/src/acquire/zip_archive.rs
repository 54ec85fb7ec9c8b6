use super::archive::{extract_archive, find_library_root};
use super::{new_staging_dir, Acquirer, StagedLibrary};
use crate::cancel::CancellationToken;
use crate::error::{BoardlibError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Extracts a local zip archive into staging.
pub struct ZipAcquirer {
    path: PathBuf,
}

impl ZipAcquirer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl Acquirer for ZipAcquirer {
    async fn acquire(&self, staging_root: &Path, cancel: &CancellationToken) -> Result<StagedLibrary> {
        cancel.check()?;
        if !self.path.is_file() {
            return Err(BoardlibError::Io {
                message: "zip archive not found".to_string(),
                path: Some(self.path.clone()),
                source: None,
            });
        }

        info!("Extracting {}", self.path.display());
        let staging = new_staging_dir(staging_root)?;
        let archive = self.path.clone();
        let extract_dir = staging.path().to_path_buf();
        let root = tokio::task::spawn_blocking(move || {
            extract_archive(&archive, &extract_dir)?;
            find_library_root(&extract_dir)
        })
        .await
        .map_err(|e| BoardlibError::Other(format!("Extraction task failed: {}", e)))??;

        // Without a declared name: the wrapping directory, else the file stem.
        let wrapper = (root != staging.path())
            .then(|| root.file_name())
            .flatten();
        let fallback = wrapper
            .or_else(|| self.path.file_stem())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "library".to_string());

        StagedLibrary::validate(
            root,
            Some(staging),
            &fallback,
            self.path.display().to_string(),
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, files: &[(&str, &str)]) {
        let mut writer = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        for (name, contents) in files {
            writer
                .start_file(name.to_string(), zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_name_from_wrapping_directory() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("download.zip");
        write_zip(&archive, &[("AudioZero/src/AudioZero.h", "")]);

        let staged = ZipAcquirer::new(archive)
            .acquire(&temp.path().join("user"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(staged.name, "AudioZero");
        assert!(staged.version.is_none());
        assert!(staged.untrusted);
    }

    #[tokio::test]
    async fn test_name_from_manifest_and_file_stem() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Flat.zip");
        write_zip(
            &archive,
            &[("library.properties", "version=2.0.0\n"), ("src/Flat.h", "")],
        );

        let staged = ZipAcquirer::new(archive)
            .acquire(&temp.path().join("user"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(staged.name, "Flat");
        assert_eq!(staged.version.unwrap().to_string(), "2.0.0");
    }

    #[tokio::test]
    async fn test_missing_archive() {
        let temp = TempDir::new().unwrap();
        let result = ZipAcquirer::new(temp.path().join("nope.zip"))
            .acquire(&temp.path().join("user"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(BoardlibError::Io { .. })));
    }
}
