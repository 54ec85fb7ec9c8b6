//! Shared fixtures for integration tests.
//!
//! Releases are served from `file://` URLs pointing at zip archives written
//! into the temp directory, so no test needs network access.

#![allow(dead_code)]

use boardlib::index::{Dependency, Resource};
use boardlib::network::hash_file;
use boardlib::{LibraryManagerBuilder, LibraryRelease, Version, VersionConstraint};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestEnv {
    pub temp: TempDir,
    pub user: PathBuf,
    pub builtin: PathBuf,
    pub avr: PathBuf,
    pub downloads: PathBuf,
    pub archives: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        let env = Self {
            user: root.join("sketchbook").join("libraries"),
            builtin: root.join("builtin"),
            avr: root.join("hardware").join("avr").join("libraries"),
            downloads: root.join("staging"),
            archives: root.join("archives"),
            temp,
        };
        for dir in [&env.user, &env.builtin, &env.avr, &env.archives] {
            std::fs::create_dir_all(dir).unwrap();
        }
        env
    }

    /// Builder over every directory of the environment; untrusted sources
    /// stay disabled.
    pub fn builder(&self) -> LibraryManagerBuilder {
        LibraryManagerBuilder::new(&self.user)
            .with_builtin_dir(&self.builtin)
            .with_platform("arduino:avr", &self.avr)
            .with_download_dir(&self.downloads)
    }

    /// Write a zip archive holding one library wrapped in `top_dir`.
    pub fn zip_library(&self, file_name: &str, top_dir: &str, name: &str, version: &str) -> PathBuf {
        let manifest = format!("name={}\nversion={}\narchitectures=*\n", name, version);
        self.zip_files(
            file_name,
            &[
                (format!("{}/library.properties", top_dir), manifest),
                (format!("{}/src/{}.h", top_dir, top_dir), String::new()),
            ],
        )
    }

    /// Write a zip archive with arbitrary entries.
    pub fn zip_files(&self, file_name: &str, files: &[(String, String)]) -> PathBuf {
        let path = self.archives.join(file_name);
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        for (name, contents) in files {
            writer
                .start_file(name.clone(), zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
        path
    }

    /// Index release backed by a freshly written archive.
    pub async fn release(&self, name: &str, version: &str, deps: &[(&str, &str)]) -> LibraryRelease {
        let dir = name.replace(' ', "_");
        let file_name = format!("{}-{}.zip", dir, version);
        let archive = self.zip_library(&file_name, &format!("{}-{}", dir, version), name, version);
        let (size, digest) = hash_file(&archive).await.unwrap();

        let mut release = LibraryRelease::new(name, Version::parse(version).unwrap()).with_resource(Resource {
            url: url::Url::from_file_path(&archive).unwrap().to_string(),
            archive_file_name: file_name,
            size: Some(size),
            checksum: Some(format!("SHA-256:{}", digest)),
        });
        for (dep, constraint) in deps {
            release = release.with_dependency(Dependency::new(
                *dep,
                VersionConstraint::parse(constraint).unwrap(),
            ));
        }
        release
    }

    /// Write a library directory directly into `root`.
    pub fn write_library(&self, root: &Path, dir: &str, name: &str, version: &str) -> PathBuf {
        let path = root.join(dir);
        std::fs::create_dir_all(path.join("src")).unwrap();
        std::fs::write(
            path.join("library.properties"),
            format!("name={}\nversion={}\n", name, version),
        )
        .unwrap();
        std::fs::write(path.join("src").join(format!("{}.h", dir)), "").unwrap();
        path
    }

    /// Names of the visible entries of a directory, sorted.
    pub fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|n| !n.starts_with('.'))
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

/// Whether a `git` executable is available.
pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
