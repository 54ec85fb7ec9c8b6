//! Moving staged libraries into a library directory.
//!
//! The old copy is renamed aside into a backup area, the new copy is
//! renamed in, then the backup is deleted. A failure between the two
//! renames puts the old copy back.

use crate::acquire::archive::{copy_dir_recursive, copy_dir_skipping};
use crate::acquire::StagedLibrary;
use crate::cancel::CancellationToken;
use crate::config::InstallConfig;
use crate::error::{BoardlibError, Result};
use crate::index::sanitize_name;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A directory moved aside while its replacement goes in.
struct Backup {
    original: PathBuf,
    moved_to: PathBuf,
    _area: TempDir,
}

impl Backup {
    fn take(original: &Path) -> Result<Self> {
        let parent = original.parent().unwrap_or(original);
        let area = tempfile::Builder::new()
            .prefix(InstallConfig::BACKUP_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| BoardlibError::io_with_path(e, parent))?;
        let moved_to = area.path().join("previous");
        std::fs::rename(original, &moved_to).map_err(|e| BoardlibError::io_with_path(e, original))?;
        debug!("Moved {} aside", original.display());
        Ok(Self {
            original: original.to_path_buf(),
            moved_to,
            _area: area,
        })
    }

    fn restore(self) {
        if let Err(e) = std::fs::rename(&self.moved_to, &self.original) {
            warn!(
                "Failed to restore {} from {}: {}",
                self.original.display(),
                self.moved_to.display(),
                e
            );
        }
    }
}

/// Directory a library named `name` is installed into under `dest_root`.
pub fn install_dir(dest_root: &Path, name: &str) -> PathBuf {
    dest_root.join(sanitize_name(name))
}

/// Place `staged` under `dest_root`, replacing `replaces` and any
/// directory already at the target path. Returns the final directory.
pub fn place(
    staged: &StagedLibrary,
    dest_root: &Path,
    replaces: Option<&Path>,
    cancel: &CancellationToken,
) -> Result<PathBuf> {
    cancel.check()?;
    std::fs::create_dir_all(dest_root).map_err(|e| BoardlibError::io_with_path(e, dest_root))?;
    let target = install_dir(dest_root, &staged.name);

    // Sources the caller owns are copied next to the destination first. A
    // destination nested in the source is not part of the library.
    let copy_area;
    let source = if staged.owns_content() {
        staged.root.clone()
    } else {
        copy_area = crate::acquire::new_staging_dir(dest_root)?;
        let copy = copy_area.path().join("content");
        copy_dir_skipping(&staged.root, &copy, &[dest_root])?;
        copy
    };

    cancel.check()?;

    let mut backups = Vec::new();
    let mut to_replace: Vec<&Path> = replaces.into_iter().collect();
    if !to_replace.contains(&target.as_path()) {
        to_replace.push(&target);
    }
    for old in to_replace {
        if !old.exists() {
            continue;
        }
        match Backup::take(old) {
            Ok(backup) => backups.push(backup),
            Err(e) => {
                backups.into_iter().rev().for_each(Backup::restore);
                return Err(e);
            }
        }
    }

    if let Err(e) = move_into_place(&source, &target) {
        backups.into_iter().rev().for_each(Backup::restore);
        return Err(e);
    }

    // Dropping the backups deletes the previous copies.
    drop(backups);
    info!("Installed {} into {}", staged.name, target.display());
    Ok(target)
}

fn move_into_place(source: &Path, target: &Path) -> Result<()> {
    match std::fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Rename failed ({}), copying {} instead", e, source.display());
            copy_dir_recursive(source, target).inspect_err(|_| {
                let _ = std::fs::remove_dir_all(target);
            })
        }
    }
}

/// Remove an installed library directory.
pub fn remove(path: &Path) -> Result<()> {
    let backup = Backup::take(path)?;
    info!("Removed {}", path.display());
    drop(backup);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::{Acquirer, LocalDirAcquirer};
    use tempfile::TempDir;

    fn library(root: &Path, dir: &str, manifest: &str) -> PathBuf {
        let path = root.join(dir);
        std::fs::create_dir_all(path.join("src")).unwrap();
        std::fs::write(path.join("library.properties"), manifest).unwrap();
        std::fs::write(path.join("src").join("Lib.h"), "").unwrap();
        path
    }

    async fn stage(path: PathBuf) -> StagedLibrary {
        LocalDirAcquirer::new(path)
            .acquire(Path::new("/unused"), &CancellationToken::new())
            .await
            .unwrap()
    }

    fn visible_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_place_copies_caller_directory() {
        let temp = TempDir::new().unwrap();
        let source = library(temp.path(), "checkout", "name=Sensor Kit\nversion=1.0.0\n");
        let user = temp.path().join("user");

        let staged = stage(source.clone()).await;
        let placed = place(&staged, &user, None, &CancellationToken::new()).unwrap();

        assert_eq!(placed, user.join("Sensor_Kit"));
        assert!(placed.join("src/Lib.h").exists());
        assert!(source.exists());
        assert_eq!(visible_entries(&user), vec!["Sensor_Kit"]);
    }

    #[tokio::test]
    async fn test_place_from_source_containing_destination() {
        let temp = TempDir::new().unwrap();
        let source = library(temp.path(), "MyLib", "name=MyLib\nversion=1.0.0\n");
        let user = source.join("libraries");
        library(&user, "Other", "name=Other\nversion=1.0.0\n");

        let staged = stage(source.clone()).await;
        let placed = place(&staged, &user, None, &CancellationToken::new()).unwrap();

        assert_eq!(placed, user.join("MyLib"));
        assert!(placed.join("src/Lib.h").exists());
        assert!(!placed.join("libraries").exists());
        assert_eq!(visible_entries(&user), vec!["MyLib", "Other"]);
    }

    #[tokio::test]
    async fn test_place_replaces_differently_named_directory() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("user");
        let old = library(&user, "SigFox", "name=Arduino SigFox for MKRFox1200\nversion=1.0.2\n");
        let source = library(temp.path(), "new", "name=Arduino SigFox for MKRFox1200\nversion=1.0.3\n");

        let staged = stage(source).await;
        let placed = place(&staged, &user, Some(&old), &CancellationToken::new()).unwrap();

        assert!(!old.exists());
        assert_eq!(visible_entries(&user), vec!["Arduino_SigFox_for_MKRFox1200"]);
        let manifest = std::fs::read_to_string(placed.join("library.properties")).unwrap();
        assert!(manifest.contains("1.0.3"));
    }

    #[tokio::test]
    async fn test_cancelled_placement_leaves_destination_untouched() {
        let temp = TempDir::new().unwrap();
        let user = temp.path().join("user");
        let old = library(&user, "Lib", "name=Lib\nversion=1.0.0\n");
        let source = library(temp.path(), "new", "name=Lib\nversion=2.0.0\n");

        let staged = stage(source).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = place(&staged, &user, Some(&old), &cancel);

        assert!(matches!(result, Err(BoardlibError::Cancelled)));
        let manifest = std::fs::read_to_string(old.join("library.properties")).unwrap();
        assert!(manifest.contains("1.0.0"));
    }

    #[test]
    fn test_remove() {
        let temp = TempDir::new().unwrap();
        let lib = library(temp.path(), "Gone", "name=Gone\n");
        remove(&lib).unwrap();
        assert!(!lib.exists());
        assert!(visible_entries(temp.path()).is_empty());
    }
}
