//! Installs from zip archives, git repositories and local directories.

mod common;

use boardlib::config::InstallConfig;
use boardlib::{
    BoardlibError, CancellationToken, EntryStatus, IndexCatalog, InstallOptions, LibraryManager,
    ResolveRequest,
};
use common::{git_available, TestEnv};
use std::path::Path;
use std::process::Command;

async fn unsafe_manager(env: &TestEnv) -> LibraryManager {
    env.builder().with_unsafe_install(true).build().await.unwrap()
}

#[tokio::test]
async fn test_untrusted_sources_disabled_by_default() {
    let env = TestEnv::new();
    let archive = env.zip_library("AudioZero.zip", "AudioZero", "AudioZero", "1.0.0");
    let manager = env.builder().build().await.unwrap();
    let cancel = CancellationToken::new();

    let err = manager
        .install_zip(&[archive], InstallOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, BoardlibError::UnsafeInstallDisabled { .. }));
    assert!(err
        .to_string()
        .starts_with("--git-url and --zip-path are disabled by default"));

    let err = manager
        .install_git(
            &["https://github.com/arduino-libraries/WiFi101.git".to_string()],
            InstallOptions::default(),
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BoardlibError::UnsafeInstallDisabled { .. }));
    assert!(TestEnv::entries(&env.user).is_empty());
}

#[tokio::test]
async fn test_zip_install_strips_metadata() {
    let env = TestEnv::new();
    let archive = env.zip_files(
        "AudioZero-1.1.1.zip",
        &[
            (
                "AudioZero/library.properties".into(),
                "name=AudioZero\nversion=1.1.1\n".into(),
            ),
            ("AudioZero/src/AudioZero.h".into(), String::new()),
            ("AudioZero/.DS_Store".into(), String::new()),
            ("__MACOSX/AudioZero/._AudioZero.h".into(), String::new()),
        ],
    );
    let manager = unsafe_manager(&env).await;

    let report = manager
        .install_zip(&[archive], InstallOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].status, EntryStatus::Installed);
    assert_eq!(report.advisories, vec![InstallConfig::UNSAFE_INSTALL_ADVISORY.to_string()]);
    let installed = env.user.join("AudioZero");
    assert!(installed.join("src/AudioZero.h").exists());
    assert!(!installed.join(".DS_Store").exists());
    assert_eq!(TestEnv::entries(&env.user), vec!["AudioZero"]);
}

#[tokio::test]
async fn test_invalid_zip_creates_nothing() {
    let env = TestEnv::new();
    let archive = env.zip_files(
        "Empty.zip",
        &[("Empty/README.md".into(), "no library here".into())],
    );
    let manager = unsafe_manager(&env).await;

    let err = manager
        .install_zip(&[archive], InstallOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BoardlibError::InvalidLibrary { .. }));
    assert!(err.to_string().starts_with("library not valid"));
    assert!(TestEnv::entries(&env.user).is_empty());
}

#[tokio::test]
async fn test_multiple_zips_report_separately() {
    let env = TestEnv::new();
    let first = env.zip_library("A.zip", "A", "A", "1.0.0");
    let second = env.zip_library("B.zip", "B", "B", "1.0.0");
    let manager = unsafe_manager(&env).await;

    let report = manager
        .install_zip(
            &[first, second],
            InstallOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.advisories.len(), 1);
    assert_eq!(TestEnv::entries(&env.user), vec!["A", "B"]);
}

#[tokio::test]
async fn test_local_directory_is_copied() {
    let env = TestEnv::new();
    let source = env.write_library(env.temp.path(), "work", "Sensor Kit", "0.1.0");
    let manager = unsafe_manager(&env).await;

    manager
        .install_local(&source, InstallOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(source.join("library.properties").exists());
    assert_eq!(TestEnv::entries(&env.user), vec!["Sensor_Kit"]);
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
        .status;
    assert!(status.success(), "git {:?} failed", args);
}

fn git_repo(env: &TestEnv, version: &str) -> std::path::PathBuf {
    let repo = env.temp.path().join("SigFox");
    if !repo.exists() {
        std::fs::create_dir_all(repo.join("src")).unwrap();
        git(&repo, &["init", "--quiet"]);
    }
    std::fs::write(
        repo.join("library.properties"),
        format!("name=Arduino SigFox for MKRFox1200\nversion={}\n", version),
    )
    .unwrap();
    std::fs::write(repo.join("src").join("SigFox.h"), version).unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "--quiet", "-m", version]);
    git(&repo, &["tag", version]);
    repo
}

#[tokio::test]
async fn test_git_install_with_ref_and_index_reinstall() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let env = TestEnv::new();
    let repo = git_repo(&env, "1.0.2");
    git_repo(&env, "1.0.3");

    let catalog = IndexCatalog::from_releases(vec![
        env.release("Arduino SigFox for MKRFox1200", "1.0.3", &[]).await,
    ]);
    let manager = env
        .builder()
        .with_catalog(catalog)
        .with_unsafe_install(true)
        .build()
        .await
        .unwrap();
    let cancel = CancellationToken::new();

    let url = format!("{}#1.0.2", repo.display());
    let report = manager
        .install_git(&[url], InstallOptions::default(), &cancel)
        .await
        .unwrap();
    let placed = report.outcomes[0].path.clone().unwrap();
    assert!(!placed.join(".git").exists());
    assert_eq!(
        std::fs::read_to_string(placed.join("src/SigFox.h")).unwrap(),
        "1.0.2"
    );

    // An index install of the same library replaces the git copy.
    let report = manager
        .install(
            &ResolveRequest::new("Arduino SigFox for MKRFox1200"),
            InstallOptions::default(),
            &cancel,
        )
        .await
        .unwrap();
    assert!(matches!(report.outcomes[0].status, EntryStatus::Upgraded { .. }));
    assert_eq!(manager.installed().await.len(), 1);
}

#[tokio::test]
async fn test_git_install_bad_ref_fails() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let env = TestEnv::new();
    let repo = git_repo(&env, "1.0.0");
    let manager = unsafe_manager(&env).await;

    let err = manager
        .install_git(
            &[format!("{}#does-not-exist", repo.display())],
            InstallOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BoardlibError::Git { .. }));
    assert!(TestEnv::entries(&env.user).is_empty());
}

#[tokio::test]
async fn test_zip_reinstall_of_same_version_with_no_overwrite() {
    let env = TestEnv::new();
    let archive = env.zip_library("Lib.zip", "Lib", "Lib", "1.0.0");
    let manager = unsafe_manager(&env).await;
    let cancel = CancellationToken::new();

    let first = manager
        .install_zip(&[archive.clone()], InstallOptions::default(), &cancel)
        .await
        .unwrap();
    assert_eq!(first.outcomes[0].status, EntryStatus::Installed);

    let options = InstallOptions {
        no_overwrite: true,
        ..Default::default()
    };
    let second = manager.install_zip(&[archive], options, &cancel).await.unwrap();
    assert_eq!(second.outcomes[0].status, EntryStatus::AlreadyInstalled);
    assert_eq!(second.outcomes[0].path, first.outcomes[0].path);
    assert_eq!(manager.installed().await.len(), 1);
}
