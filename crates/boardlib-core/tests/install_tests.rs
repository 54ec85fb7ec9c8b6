//! End-to-end install, upgrade and uninstall scenarios through
//! `LibraryManager`.

mod common;

use boardlib::{
    BoardlibError, CancellationToken, EntryStatus, IndexCatalog, InstallOptions, LibraryLocation,
    LibraryManager, ListFilter, ResolveRequest,
};
use common::TestEnv;
use std::sync::Arc;

async fn manager(env: &TestEnv, catalog: IndexCatalog) -> LibraryManager {
    env.builder().with_catalog(catalog).build().await.unwrap()
}

#[tokio::test]
async fn test_install_with_transitive_dependency() {
    let env = TestEnv::new();
    let catalog = IndexCatalog::from_releases(vec![
        env.release("A", "1.0.0", &[("B", ">=1.0")]).await,
        env.release("B", "0.9.0", &[]).await,
        env.release("B", "1.5.0", &[]).await,
    ]);
    let manager = manager(&env, catalog).await;

    let report = manager
        .install(
            &ResolveRequest::new("A"),
            InstallOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let planned: Vec<String> = report.plan.entries.iter().map(|e| e.id()).collect();
    assert_eq!(planned, vec!["A@1.0.0", "B@1.5.0"]);
    assert_eq!(report.placed().count(), 2);
    assert_eq!(TestEnv::entries(&env.user), vec!["A", "B"]);

    let installed = manager.installed().await;
    assert_eq!(installed.find_shared("B")[0].version.as_ref().unwrap().to_string(), "1.5.0");
    // Archives land in the download cache.
    assert!(env.downloads.join("libraries").join("A-1.0.0.zip").exists());
}

#[tokio::test]
async fn test_unsatisfiable_dependency_installs_nothing() {
    let env = TestEnv::new();
    let catalog = IndexCatalog::from_releases(vec![
        env.release("X", "1.0.0", &[("Y", ">=2.0")]).await,
        env.release("Y", "1.0.0", &[]).await,
    ]);
    let manager = manager(&env, catalog).await;

    let err = manager
        .install(
            &ResolveRequest::new("X"),
            InstallOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(&err, BoardlibError::Unsatisfiable { dependency, .. } if dependency == "Y"));
    assert!(err.to_string().contains("dependency 'Y' is not available"));
    assert!(TestEnv::entries(&env.user).is_empty());
}

#[tokio::test]
async fn test_install_is_idempotent() {
    let env = TestEnv::new();
    let catalog = IndexCatalog::from_releases(vec![env.release("Servo", "1.2.1", &[]).await]);
    let manager = manager(&env, catalog).await;
    let request = ResolveRequest::new("Servo");

    manager
        .install(&request, InstallOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    let again = manager
        .install(&request, InstallOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(again.is_noop());
    assert_eq!(again.outcomes[0].status, EntryStatus::AlreadyInstalled);
    assert_eq!(manager.installed().await.find_shared("Servo").len(), 1);
}

#[tokio::test]
async fn test_relaxed_version_selects_release() {
    let env = TestEnv::new();
    let catalog = IndexCatalog::from_releases(vec![
        env.release("Lib", "1.0.0", &[]).await,
        env.release("Lib", "2.0.0", &[]).await,
    ]);
    let manager = manager(&env, catalog).await;

    for selector in ["Lib@1", "Lib@1.0", "Lib@1.0.0"] {
        let plan = manager
            .resolve(&ResolveRequest::parse(selector), Default::default())
            .await
            .unwrap();
        assert_eq!(plan.entries[0].version.to_string(), "1.0.0", "{selector}");
    }
}

#[tokio::test]
async fn test_no_overwrite_keeps_existing_version() {
    let env = TestEnv::new();
    let existing = env.write_library(&env.user, "Lib", "Lib", "1.0.0");
    let catalog = IndexCatalog::from_releases(vec![env.release("Lib", "2.0.0", &[]).await]);
    let manager = manager(&env, catalog).await;

    let options = InstallOptions {
        no_overwrite: true,
        ..Default::default()
    };
    let err = manager
        .install(&ResolveRequest::new("Lib"), options, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, BoardlibError::OverwriteRefused { .. }));
    let manifest = std::fs::read_to_string(existing.join("library.properties")).unwrap();
    assert!(manifest.contains("version=1.0.0"));
}

#[tokio::test]
async fn test_duplicate_installations_block_mutations_but_list() {
    let env = TestEnv::new();
    env.write_library(&env.user, "Foo", "Foo", "1.0.0");
    env.write_library(&env.builtin, "Foo", "Foo", "1.0.0");
    let catalog = IndexCatalog::from_releases(vec![env.release("Foo", "1.1.0", &[]).await]);
    let manager = manager(&env, catalog).await;
    let cancel = CancellationToken::new();

    let install = manager
        .install(&ResolveRequest::new("Foo"), InstallOptions::default(), &cancel)
        .await;
    let upgrade = manager
        .upgrade(&["Foo".to_string()], InstallOptions::default(), &cancel)
        .await;
    let uninstall = manager.uninstall("Foo").await;

    for result in [install.map(|_| ()), upgrade.map(|_| ()), uninstall.map(|_| ())] {
        let err = result.unwrap_err();
        assert!(
            err.to_string().starts_with("The library Foo has multiple installations"),
            "{err}"
        );
    }

    let rows = manager.list(&ListFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_upgrade_replaces_and_then_is_noop() {
    let env = TestEnv::new();
    env.write_library(&env.user, "Servo", "Servo", "1.1.6");
    env.write_library(&env.avr, "Servo", "Servo", "1.0.0");
    let catalog = IndexCatalog::from_releases(vec![
        env.release("Servo", "1.1.6", &[]).await,
        env.release("Servo", "1.2.1", &[]).await,
    ]);
    let manager = manager(&env, catalog).await;
    let cancel = CancellationToken::new();

    let report = manager
        .upgrade(&[], InstallOptions::default(), &cancel)
        .await
        .unwrap();
    assert!(matches!(
        report.outcomes[0].status,
        EntryStatus::Upgraded { from: Some(_) }
    ));

    let again = manager
        .upgrade(&["Servo".to_string()], InstallOptions::default(), &cancel)
        .await
        .unwrap();
    assert!(again.is_noop());

    // The bundled copy keeps its version.
    let installed = manager.installed().await;
    let bundled: Vec<_> = installed
        .find_by_name("Servo")
        .into_iter()
        .filter(|l| l.location.is_platform_bundled())
        .collect();
    assert_eq!(bundled.len(), 1);
    assert_eq!(bundled[0].version.as_ref().unwrap().to_string(), "1.0.0");
}

#[tokio::test]
async fn test_upgrade_of_bundled_only_library_is_not_found() {
    let env = TestEnv::new();
    env.write_library(&env.avr, "Servo", "Servo", "1.0.0");
    let catalog = IndexCatalog::from_releases(vec![env.release("Servo", "1.2.1", &[]).await]);
    let manager = manager(&env, catalog).await;

    let err = manager
        .upgrade(
            &["Servo".to_string()],
            InstallOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Library 'Servo' not found");

    // A bundled copy never blocks a user install.
    let report = manager
        .install(
            &ResolveRequest::new("Servo"),
            InstallOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.outcomes[0].status, EntryStatus::Installed);
}

#[tokio::test]
async fn test_unparsable_installed_version_is_upgraded() {
    let env = TestEnv::new();
    env.write_library(&env.user, "Odd", "Odd", "1.0001");
    let catalog = IndexCatalog::from_releases(vec![env.release("Odd", "1.0.0", &[]).await]);
    let manager = manager(&env, catalog).await;

    let rows = manager
        .list(&ListFilter {
            updatable: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].library.version.is_none());

    let report = manager
        .upgrade(&[], InstallOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(report.outcomes[0].status, EntryStatus::Upgraded { from: None }));
}

#[tokio::test]
async fn test_install_in_builtin_dir() {
    let env = TestEnv::new();
    let catalog = IndexCatalog::from_releases(vec![env.release("Firmata", "2.5.9", &[]).await]);
    let manager = manager(&env, catalog).await;

    let options = InstallOptions {
        install_in_builtin: true,
        ..Default::default()
    };
    let report = manager
        .install(&ResolveRequest::new("Firmata"), options, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.plan.entries[0].usage.as_str(), "install-builtin");
    assert_eq!(TestEnv::entries(&env.builtin), vec!["Firmata"]);
    assert!(TestEnv::entries(&env.user).is_empty());
    let installed = manager.installed().await;
    assert_eq!(installed.find_shared("Firmata")[0].location, LibraryLocation::Builtin);
}

#[tokio::test]
async fn test_cancelled_install_leaves_destination_empty() {
    let env = TestEnv::new();
    let catalog = IndexCatalog::from_releases(vec![env.release("Lib", "1.0.0", &[]).await]);
    let manager = manager(&env, catalog).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = manager
        .install(&ResolveRequest::new("Lib"), InstallOptions::default(), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, BoardlibError::Cancelled));
    assert!(TestEnv::entries(&env.user).is_empty());
}

#[tokio::test]
async fn test_corrupt_artifact_is_rejected() {
    let env = TestEnv::new();
    let mut release = env.release("Lib", "1.0.0", &[]).await;
    if let Some(resource) = release.resource.as_mut() {
        resource.checksum = Some(format!("SHA-256:{}", "0".repeat(64)));
    }
    let manager = manager(&env, IndexCatalog::from_releases(vec![release])).await;

    let err = manager
        .install(
            &ResolveRequest::new("Lib"),
            InstallOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BoardlibError::ChecksumMismatch { .. }));
    assert!(TestEnv::entries(&env.user).is_empty());
}

#[tokio::test]
async fn test_concurrent_installs_are_serialized() {
    let env = TestEnv::new();
    let catalog = IndexCatalog::from_releases(vec![
        env.release("One", "1.0.0", &[("Shared", "")]).await,
        env.release("Two", "1.0.0", &[("Shared", "")]).await,
        env.release("Shared", "1.0.0", &[]).await,
    ]);
    let manager = Arc::new(manager(&env, catalog).await);

    let tasks: Vec<_> = ["One", "Two"]
        .into_iter()
        .map(|name| {
            let manager = manager.clone();
            tokio::spawn(async move {
                manager
                    .install(
                        &ResolveRequest::new(name),
                        InstallOptions::default(),
                        &CancellationToken::new(),
                    )
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(TestEnv::entries(&env.user), vec!["One", "Shared", "Two"]);
    assert_eq!(manager.installed().await.find_shared("Shared").len(), 1);
}

#[tokio::test]
async fn test_uninstall_removes_directory() {
    let env = TestEnv::new();
    let path = env.write_library(&env.user, "Gone", "Gone", "1.0.0");
    let manager = manager(&env, IndexCatalog::empty()).await;

    let removed = manager.uninstall("gone").await.unwrap();
    assert_eq!(removed.path, path);
    assert!(!path.exists());
    assert!(manager.installed().await.is_empty());

    let err = manager.uninstall("Gone").await.unwrap_err();
    assert!(matches!(err, BoardlibError::NotInstalled { .. }));
}
