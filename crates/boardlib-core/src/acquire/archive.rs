//! Archive extraction and directory helpers for staging.

use crate::error::{BoardlibError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Archive formats understood by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
    TarZst,
}

impl ArchiveKind {
    /// Guess the format from the file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.zst") {
            Some(ArchiveKind::TarZst)
        } else {
            None
        }
    }
}

/// Platform metadata that never belongs to a library: resource forks,
/// AppleDouble files and Finder state.
pub fn is_platform_metadata(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part == "__MACOSX" || part == ".DS_Store" || part.starts_with("._")
        }
        _ => false,
    })
}

/// Extract an archive into `dest`, skipping platform metadata entries.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    let kind = ArchiveKind::from_path(archive).ok_or_else(|| BoardlibError::Archive {
        path: archive.to_path_buf(),
        message: "unsupported archive format".to_string(),
    })?;
    std::fs::create_dir_all(dest).map_err(|e| BoardlibError::io_with_path(e, dest))?;

    debug!("Extracting {} into {}", archive.display(), dest.display());
    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::TarGz => {
            let file = open(archive)?;
            extract_tar(
                archive,
                flate2::read::GzDecoder::new(BufReader::new(file)),
                dest,
            )
        }
        ArchiveKind::TarZst => {
            let file = open(archive)?;
            let decoder = zstd::stream::read::Decoder::new(file).map_err(|e| BoardlibError::Archive {
                path: archive.to_path_buf(),
                message: format!("Failed to initialize zstd decoder: {}", e),
            })?;
            extract_tar(archive, decoder, dest)
        }
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| BoardlibError::io_with_path(e, path))
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(open(archive_path)?).map_err(|e| BoardlibError::Archive {
        path: archive_path.to_path_buf(),
        message: format!("Invalid zip archive: {}", e),
    })?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| BoardlibError::Archive {
            path: archive_path.to_path_buf(),
            message: format!("Failed to read zip entry {}: {}", i, e),
        })?;

        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping unsafe zip entry {}", entry.name());
            continue;
        };
        if is_platform_metadata(&relative) {
            continue;
        }
        let outpath = dest.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| BoardlibError::io_with_path(e, &outpath))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BoardlibError::io_with_path(e, parent))?;
        }
        let mut outfile =
            File::create(&outpath).map_err(|e| BoardlibError::io_with_path(e, &outpath))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| BoardlibError::io_with_path(e, &outpath))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(())
}

fn extract_tar<R: Read>(archive_path: &Path, reader: R, dest: &Path) -> Result<()> {
    let archive_error = |e: std::io::Error| BoardlibError::Archive {
        path: archive_path.to_path_buf(),
        message: format!("Failed to extract tarball: {}", e),
    };

    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries().map_err(archive_error)? {
        let mut entry = entry.map_err(archive_error)?;
        let relative = entry.path().map_err(archive_error)?.into_owned();
        if is_platform_metadata(&relative) {
            continue;
        }
        // unpack_in refuses entries escaping `dest`
        entry.unpack_in(dest).map_err(archive_error)?;
    }
    Ok(())
}

/// The directory holding the library inside an extraction directory.
///
/// Archives usually wrap their content in one top-level directory; when
/// that is the only entry, it is the root.
pub fn find_library_root(extract_dir: &Path) -> Result<PathBuf> {
    let entries: Vec<PathBuf> = std::fs::read_dir(extract_dir)
        .map_err(|e| BoardlibError::io_with_path(e, extract_dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| !is_platform_metadata(Path::new(p.file_name().unwrap_or_default())))
        .collect();

    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(extract_dir.to_path_buf()),
    }
}

/// Recursively copy a directory.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    copy_dir_skipping(src, dst, &[])
}

/// Recursively copy a directory, leaving out the `skip` subtrees and `dst`
/// itself when either lies inside `src`.
pub fn copy_dir_skipping(src: &Path, dst: &Path, skip: &[&Path]) -> Result<()> {
    let absolute = |p: &Path| std::path::absolute(p).map_err(|e| BoardlibError::io_with_path(e, p));
    let src = absolute(src)?;
    let mut excluded = vec![absolute(dst)?];
    for path in skip {
        excluded.push(absolute(*path)?);
    }
    excluded.retain(|p| p != &src && p.starts_with(&src));

    let walker = walkdir::WalkDir::new(&src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !excluded.iter().any(|x| e.path() == x));
    for entry in walker {
        let entry = entry.map_err(|e| BoardlibError::Io {
            message: format!("Failed to walk {}: {}", src.display(), e),
            path: e.path().map(Path::to_path_buf),
            source: e.into_io_error(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(&src)
            .map_err(|e| BoardlibError::Other(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| BoardlibError::io_with_path(e, &target))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)
                .map_err(|e| BoardlibError::io_with_path(e, entry.path()))?;
        } else {
            debug!("Skipping special file {}", entry.path().display());
        }
    }
    Ok(())
}

/// Remove a directory tree if it exists.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BoardlibError::io_with_path(e, path)),
    }
}
