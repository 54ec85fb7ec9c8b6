//! Artifact downloads with integrity checks and cancellation.
//!
//! Bytes stream into a uniquely named `<destination>.<random>.part` file next
//! to the destination while a SHA-256 digest is computed on the fly. The temp file is renamed over the destination only after the
//! size and checksum verify, so the download cache never holds a partial or
//! corrupt archive under its final name.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::error::{BoardlibError, Result};
use crate::network::client::HttpClient;
use crate::network::retry::{retry_async, RetryConfig};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Expected checksum of an artifact, as published in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    /// Lowercase hex SHA-256 digest.
    sha256: String,
}

impl Checksum {
    /// Parse an `ALGORITHM:hex` checksum. Only SHA-256 is supported.
    pub fn parse(value: &str) -> Result<Self> {
        let (algorithm, digest) = value.split_once(':').ok_or_else(|| {
            BoardlibError::InvalidLibrary {
                reason: format!("malformed checksum '{}'", value),
                path: None,
            }
        })?;

        if !algorithm.eq_ignore_ascii_case("SHA-256") {
            return Err(BoardlibError::InvalidLibrary {
                reason: format!("unsupported checksum algorithm '{}'", algorithm),
                path: None,
            });
        }
        if !matches!(hex::decode(digest), Ok(bytes) if bytes.len() == 32) {
            return Err(BoardlibError::InvalidLibrary {
                reason: format!("malformed SHA-256 digest '{}'", digest),
                path: None,
            });
        }

        Ok(Self {
            sha256: digest.to_ascii_lowercase(),
        })
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// Size and checksum an artifact must match.
#[derive(Debug, Clone, Default)]
pub struct Integrity {
    pub size: Option<u64>,
    pub checksum: Option<Checksum>,
}

impl Integrity {
    fn check(&self, file: &Path, size: u64, digest: &str) -> Result<()> {
        if let Some(expected) = self.size {
            if expected != size {
                return Err(BoardlibError::SizeMismatch {
                    file: file.display().to_string(),
                    expected,
                    actual: size,
                });
            }
        }
        if let Some(checksum) = &self.checksum {
            if checksum.sha256 != digest {
                return Err(BoardlibError::ChecksumMismatch {
                    file: file.display().to_string(),
                    expected: format!("SHA-256:{}", checksum.sha256),
                    actual: format!("SHA-256:{}", digest),
                });
            }
        }
        Ok(())
    }
}

/// Compute size and SHA-256 of a file on disk.
pub async fn hash_file(path: &Path) -> Result<(u64, String)> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| BoardlibError::io_with_path(e, path))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; NetworkConfig::DOWNLOAD_CHUNK_SIZE];
    let mut size = 0u64;

    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| BoardlibError::io_with_path(e, path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }

    Ok((size, hex::encode(hasher.finalize())))
}

/// Verify an existing file against the expected integrity.
pub async fn verify_file(path: &Path, integrity: &Integrity) -> Result<()> {
    let (size, digest) = hash_file(path).await?;
    integrity.check(path, size, &digest)
}

/// Downloads artifacts into a cache directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    http: Arc<HttpClient>,
    retry: RetryConfig,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(Arc::new(HttpClient::new()?)))
    }

    pub fn with_client(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Make `destination` hold a verified copy of `url`.
    ///
    /// An existing file that verifies is reused without network access;
    /// one that does not is discarded and fetched again. Returns the final
    /// size in bytes.
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        integrity: &Integrity,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        cancel.check()?;

        if fs::try_exists(destination).await.unwrap_or(false) {
            match verify_file(destination, integrity).await {
                Ok(()) => {
                    debug!("Using cached artifact {}", destination.display());
                    return Ok(fs::metadata(destination).await?.len());
                }
                Err(e) => {
                    warn!("Discarding cached artifact {}: {}", destination.display(), e);
                    fs::remove_file(destination)
                        .await
                        .map_err(|e| BoardlibError::io_with_path(e, destination))?;
                }
            }
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BoardlibError::io_with_path(e, parent))?;
        }

        let (result, attempts) = retry_async(&self.retry, cancel, |_| {
            self.download(url, destination, integrity, cancel)
        })
        .await;
        if attempts > 1 {
            debug!("Download of {} took {} attempts", url, attempts);
        }
        result
    }

    async fn download(
        &self,
        url: &str,
        destination: &Path,
        integrity: &Integrity,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let temp_path = temp_file_for(destination)?;

        debug!("Starting download: {}", url);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BoardlibError::Cancelled),
            r = self.stream_to(url, &temp_path) => r,
        };

        // Dropping `temp_path` on any error path deletes the partial file.
        let (size, digest) = result?;
        integrity.check(destination, size, &digest)?;
        temp_path
            .persist(destination)
            .map_err(|e| BoardlibError::io_with_path(e.error, destination))?;
        info!("Downloaded {} bytes to {}", size, destination.display());
        Ok(size)
    }

    async fn stream_to(&self, url: &str, temp_path: &Path) -> Result<(u64, String)> {
        if let Some(source) = local_file_url(url) {
            return copy_local(&source, temp_path).await;
        }

        let response = self.http.get(url).await?;
        let mut file = fs::File::create(temp_path)
            .await
            .map_err(|e| BoardlibError::io_with_path(e, temp_path))?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BoardlibError::Network {
                message: format!("Error reading download stream: {}", e),
                source: Some(e),
            })?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| BoardlibError::io_with_path(e, temp_path))?;
        }

        file.flush()
            .await
            .map_err(|e| BoardlibError::io_with_path(e, temp_path))?;
        Ok((size, hex::encode(hasher.finalize())))
    }
}

/// A fresh temp file beside `destination`, so concurrent fetches of the
/// same artifact never write to the same partial file.
fn temp_file_for(destination: &Path) -> Result<tempfile::TempPath> {
    let dir = destination.parent().unwrap_or(Path::new("."));
    let prefix = match destination.file_name() {
        Some(name) => format!("{}.", name.to_string_lossy()),
        None => "download.".to_string(),
    };
    let file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(NetworkConfig::DOWNLOAD_TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| BoardlibError::io_with_path(e, dir))?;
    Ok(file.into_temp_path())
}

/// Resolve `file://` URLs to a local path.
fn local_file_url(url: &str) -> Option<PathBuf> {
    let parsed = url::Url::parse(url).ok()?;
    if parsed.scheme() != "file" {
        return None;
    }
    parsed.to_file_path().ok()
}

async fn copy_local(source: &Path, temp_path: &Path) -> Result<(u64, String)> {
    fs::copy(source, temp_path)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BoardlibError::DownloadFailed {
                url: source.display().to_string(),
                message: "file not found".to_string(),
            },
            _ => BoardlibError::io_with_path(e, source),
        })?;
    hash_file(temp_path).await
}
