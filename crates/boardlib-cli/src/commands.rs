//! Sub-command handlers.

use crate::output::Printer;
use crate::{Args, Command, ConfigAction};
use anyhow::{anyhow, Context, Result};
use boardlib::config::{settings_path, AppConfig, PathsConfig};
use boardlib::{
    CancellationToken, InstallOptions, LibraryManager, ListFilter, ResolveRequest, Settings,
};
use std::path::PathBuf;
use tracing::debug;

/// Directories the manager is built from, after defaults are applied.
struct Paths {
    sketchbook: PathBuf,
    data_dir: PathBuf,
    index: PathBuf,
    download_dir: PathBuf,
}

impl Paths {
    fn from_args(args: &Args) -> Result<Self> {
        let data_dir = match &args.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|dir| dir.join(AppConfig::APP_NAME))
                .ok_or_else(|| anyhow!("Cannot determine a data directory, pass --data-dir"))?,
        };
        let sketchbook = match &args.sketchbook {
            Some(dir) => dir.clone(),
            None => dirs::document_dir()
                .or_else(dirs::home_dir)
                .map(|dir| dir.join("Arduino").join("libraries"))
                .ok_or_else(|| anyhow!("Cannot determine a sketchbook, pass --sketchbook"))?,
        };
        Ok(Self {
            index: args
                .index
                .clone()
                .unwrap_or_else(|| data_dir.join(PathsConfig::INDEX_FILE)),
            download_dir: args
                .download_dir
                .clone()
                .unwrap_or_else(|| data_dir.join(PathsConfig::STAGING_DIR)),
            sketchbook,
            data_dir,
        })
    }
}

async fn open_manager(args: &Args, paths: &Paths) -> Result<LibraryManager> {
    let mut builder = LibraryManager::builder(&paths.sketchbook)
        .auto_create_dirs(true)
        .with_index_file(&paths.index)
        .with_download_dir(&paths.download_dir)
        .with_settings_file(settings_path(&paths.data_dir));
    if let Some(dir) = &args.builtin_dir {
        builder = builder.with_builtin_dir(dir);
    }
    for (id, dir) in &args.platform_libs {
        builder = builder.with_platform(id.clone(), dir);
    }
    debug!("Sketchbook: {}", paths.sketchbook.display());
    builder
        .build()
        .await
        .context("Failed to open the library manager")
}

pub async fn run(args: Args, cancel: &CancellationToken) -> Result<()> {
    let paths = Paths::from_args(&args)?;
    let printer = Printer::new(args.format);

    if let Command::Config { action } = &args.command {
        return configure(action, &paths, &printer);
    }

    let manager = open_manager(&args, &paths).await?;
    match args.command {
        Command::List {
            all,
            updatable,
            fqbn,
            name,
        } => {
            let filter = ListFilter {
                all,
                updatable,
                name,
                board: fqbn,
            };
            let rows = manager.list(&filter).await?;
            printer.listings(&rows)
        }
        Command::Search { query } => {
            let hits = manager.search(&query.join(" "));
            printer.releases(&hits)
        }
        Command::Deps { library } => {
            let rows = manager.deps(&ResolveRequest::parse(&library)).await?;
            printer.dependencies(&rows)
        }
        Command::Examples { name } => {
            let rows = manager.examples(name.as_deref()).await;
            printer.examples(&rows)
        }
        Command::Install {
            libraries,
            no_deps,
            no_overwrite,
            install_in_builtin,
            git_url,
            zip_path,
        } => {
            let options = InstallOptions {
                no_deps,
                no_overwrite,
                install_in_builtin,
            };
            let reports = if git_url {
                vec![manager.install_git(&libraries, options, cancel).await?]
            } else if zip_path {
                let paths: Vec<PathBuf> = libraries.iter().map(PathBuf::from).collect();
                vec![manager.install_zip(&paths, options, cancel).await?]
            } else {
                let mut reports = Vec::with_capacity(libraries.len());
                for library in &libraries {
                    let report = manager
                        .install(&ResolveRequest::parse(library), options, cancel)
                        .await?;
                    let failed = report.failure().is_some();
                    reports.push(report);
                    if failed {
                        break;
                    }
                }
                reports
            };
            printer.reports(&reports)
        }
        Command::Upgrade { names, no_deps } => {
            let options = InstallOptions {
                no_deps,
                ..Default::default()
            };
            let report = manager.upgrade(&names, options, cancel).await?;
            printer.reports(std::slice::from_ref(&report))
        }
        Command::Uninstall { names } => {
            let mut removed = Vec::with_capacity(names.len());
            for name in &names {
                removed.push(manager.uninstall(name).await?);
            }
            printer.uninstalled(&removed)
        }
        Command::Download { libraries } => {
            let mut archives = Vec::with_capacity(libraries.len());
            for library in &libraries {
                archives.push(
                    manager
                        .download(&ResolveRequest::parse(library), cancel)
                        .await?,
                );
            }
            printer.downloads(&archives)
        }
        Command::Config { .. } => Ok(()),
    }
}

fn configure(action: &ConfigAction, paths: &Paths, printer: &Printer) -> Result<()> {
    let path = settings_path(&paths.data_dir);
    let mut settings = Settings::load(&path)?;
    settings.library.enable_unsafe_install = matches!(action, ConfigAction::EnableUnsafeInstall);
    settings.save(&path)?;
    printer.settings(&settings, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OutputFormat;
    use clap::Parser;
    use tempfile::TempDir;

    fn parse_args(temp: &TempDir, extra: &[&str]) -> Args {
        let data = temp.path().join("data");
        let sketchbook = temp.path().join("sketchbook");
        let mut argv = vec![
            "boardlib".to_string(),
            "--data-dir".to_string(),
            data.display().to_string(),
            "--sketchbook".to_string(),
            sketchbook.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_paths_default_under_data_dir() {
        let temp = TempDir::new().unwrap();
        let args = parse_args(&temp, &["list"]);
        let paths = Paths::from_args(&args).unwrap();
        assert_eq!(paths.index, temp.path().join("data").join("library_index.json"));
        assert_eq!(paths.download_dir, temp.path().join("data").join("staging"));
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[tokio::test]
    async fn test_config_enable_unsafe_install_persists() {
        let temp = TempDir::new().unwrap();
        let args = parse_args(&temp, &["--format", "json", "config", "enable-unsafe-install"]);
        run(args, &CancellationToken::new()).await.unwrap();

        let settings = Settings::load(&settings_path(&temp.path().join("data"))).unwrap();
        assert!(settings.library.enable_unsafe_install);

        // The persisted opt-in reaches the engine.
        let args = parse_args(&temp, &["list"]);
        let paths = Paths::from_args(&args).unwrap();
        let manager = open_manager(&args, &paths).await.unwrap();
        assert!(manager.unsafe_install_enabled());
    }

    #[tokio::test]
    async fn test_list_on_empty_sketchbook() {
        let temp = TempDir::new().unwrap();
        let args = parse_args(&temp, &["--format", "json", "list", "--all"]);
        run(args, &CancellationToken::new()).await.unwrap();
        assert!(temp.path().join("sketchbook").is_dir());
    }

    #[tokio::test]
    async fn test_uninstall_unknown_library_fails() {
        let temp = TempDir::new().unwrap();
        let args = parse_args(&temp, &["uninstall", "Nope"]);
        let err = run(args, &CancellationToken::new()).await.unwrap_err();
        assert!(err.downcast_ref::<boardlib::BoardlibError>().is_some());
    }

    #[tokio::test]
    async fn test_examples_of_installed_library() {
        let temp = TempDir::new().unwrap();
        let sketch = temp
            .path()
            .join("sketchbook")
            .join("Encoder")
            .join("examples")
            .join("Basic");
        std::fs::create_dir_all(&sketch).unwrap();
        std::fs::write(sketch.join("Basic.pde"), "").unwrap();
        std::fs::write(
            temp.path().join("sketchbook/Encoder/library.properties"),
            "name=Encoder\nversion=1.4.1\n",
        )
        .unwrap();

        let args = parse_args(&temp, &["--format", "json", "examples", "Encoder"]);
        run(args, &CancellationToken::new()).await.unwrap();

        let args = parse_args(&temp, &["examples"]);
        let paths = Paths::from_args(&args).unwrap();
        let manager = open_manager(&args, &paths).await.unwrap();
        let rows = manager.examples(Some("Encoder")).await;
        assert_eq!(rows[0].examples, vec![sketch]);
    }
}
