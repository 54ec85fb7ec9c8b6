//! Index releases: download, verify, extract.

use super::archive::{extract_archive, find_library_root};
use super::{new_staging_dir, Acquirer, StagedLibrary};
use crate::cancel::CancellationToken;
use crate::error::{BoardlibError, Result};
use crate::index::{LibraryRelease, UsageTag};
use crate::network::Downloader;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Fetches a release archive into the download cache and extracts it.
pub struct IndexArtifactAcquirer {
    release: LibraryRelease,
    usage: UsageTag,
    downloader: Arc<Downloader>,
    downloads_dir: PathBuf,
}

impl IndexArtifactAcquirer {
    pub fn new(
        release: LibraryRelease,
        usage: UsageTag,
        downloader: Arc<Downloader>,
        downloads_dir: PathBuf,
    ) -> Self {
        Self {
            release,
            usage,
            downloader,
            downloads_dir,
        }
    }

    /// Cache path of the release archive.
    pub fn cache_path(&self) -> Result<PathBuf> {
        let resource = self.release.resource.as_ref().ok_or_else(|| BoardlibError::DownloadFailed {
            url: String::new(),
            message: format!("release {} has no downloadable resource", self.release.id()),
        })?;
        // Only the final component; index data never picks the directory.
        let file_name = Path::new(&resource.archive_file_name)
            .file_name()
            .ok_or_else(|| BoardlibError::DownloadFailed {
                url: resource.url.clone(),
                message: format!("invalid archive file name '{}'", resource.archive_file_name),
            })?;
        Ok(self.downloads_dir.join(file_name))
    }
}

#[async_trait]
impl Acquirer for IndexArtifactAcquirer {
    async fn acquire(&self, staging_root: &Path, cancel: &CancellationToken) -> Result<StagedLibrary> {
        let url = self.release.artifact_url(self.usage)?;
        let archive = self.cache_path()?;
        let integrity = match &self.release.resource {
            Some(resource) => resource.integrity()?,
            None => Default::default(),
        };

        info!("Downloading {}", self.release.id());
        self.downloader
            .fetch(&url, &archive, &integrity, cancel)
            .await?;
        cancel.check()?;

        let staging = new_staging_dir(staging_root)?;
        let extract_dir = staging.path().to_path_buf();
        let archive_for_task = archive.clone();
        let root = tokio::task::spawn_blocking(move || {
            extract_archive(&archive_for_task, &extract_dir)?;
            find_library_root(&extract_dir)
        })
        .await
        .map_err(|e| BoardlibError::Other(format!("Extraction task failed: {}", e)))??;

        let mut staged = StagedLibrary::validate(
            root,
            Some(staging),
            &self.release.name,
            archive.display().to_string(),
            false,
        )?;
        // The index identity wins over whatever the archive declares.
        staged.name = self.release.name.clone();
        staged.version = Some(self.release.version.clone());
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Resource;
    use crate::network::hash_file;
    use crate::version::Version;
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

    async fn release_for(archive: &Path, name: &str, version: &str) -> LibraryRelease {
        let (size, digest) = hash_file(archive).await.unwrap();
        LibraryRelease::new(name, Version::parse(version).unwrap()).with_resource(Resource {
            url: url::Url::from_file_path(archive).unwrap().to_string(),
            archive_file_name: archive.file_name().unwrap().to_string_lossy().into_owned(),
            size: Some(size),
            checksum: Some(format!("SHA-256:{}", digest)),
        })
    }

    #[tokio::test]
    async fn test_acquire_valid_release() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Servo-1.2.0.zip");
        write_zip(
            &archive,
            &[
                ("Servo-1.2.0/library.properties", "name=Servo\nversion=1.2.0\n"),
                ("Servo-1.2.0/src/Servo.h", ""),
            ],
        );

        let acquirer = IndexArtifactAcquirer::new(
            release_for(&archive, "Servo", "1.2.0").await,
            UsageTag::Install,
            Arc::new(Downloader::new().unwrap()),
            temp.path().join("cache"),
        );
        let staged = acquirer
            .acquire(&temp.path().join("user"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(staged.name, "Servo");
        assert_eq!(staged.version, Some(Version::new(1, 2, 0)));
        assert!(staged.owns_content());
        assert!(staged.root.join("src/Servo.h").exists());
        assert!(temp.path().join("cache/Servo-1.2.0.zip").exists());
    }

    #[tokio::test]
    async fn test_invalid_content_is_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("Empty-1.0.0.zip");
        write_zip(&archive, &[("Empty/README.md", "nothing here")]);

        let acquirer = IndexArtifactAcquirer::new(
            release_for(&archive, "Empty", "1.0.0").await,
            UsageTag::Install,
            Arc::new(Downloader::new().unwrap()),
            temp.path().join("cache"),
        );
        let user = temp.path().join("user");
        let err = acquirer
            .acquire(&user, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("library not valid"));
        // The staging directory is cleaned up with the failure.
        assert_eq!(std::fs::read_dir(&user).unwrap().count(), 0);
    }

    #[test]
    fn test_cache_path_ignores_directories_in_name() {
        let release = LibraryRelease::new("X", Version::new(1, 0, 0)).with_resource(Resource {
            url: "https://downloads.example.com/X-1.0.0.zip".into(),
            archive_file_name: "../../X-1.0.0.zip".into(),
            size: None,
            checksum: None,
        });
        let acquirer = IndexArtifactAcquirer::new(
            release,
            UsageTag::Download,
            Arc::new(Downloader::new().unwrap()),
            PathBuf::from("/cache"),
        );
        assert_eq!(acquirer.cache_path().unwrap(), PathBuf::from("/cache/X-1.0.0.zip"));
    }
}
