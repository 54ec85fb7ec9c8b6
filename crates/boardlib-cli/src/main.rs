//! boardlib - command-line driver for the library manager.
//!
//! Parses arguments, sets up logging and hands each sub-command to the
//! `boardlib` engine. Results go to stdout; logs go to stderr.

mod commands;
mod output;

use anyhow::Result;
use boardlib::{BoardlibError, CancellationToken, Fqbn};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "BOARDLIB_LOG";

#[derive(Parser, Debug)]
#[command(name = "boardlib")]
#[command(about = "Resolve, install and upgrade hardware-platform libraries")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// User library directory (defaults to ~/Documents/Arduino/libraries)
    #[arg(long, global = true)]
    sketchbook: Option<PathBuf>,

    /// Builtin library directory
    #[arg(long, global = true)]
    builtin_dir: Option<PathBuf>,

    /// Platform-bundled library directory as ID=PATH, e.g. arduino:avr=/opt/avr/libraries
    #[arg(long = "platform-libs", global = true, value_parser = parse_platform)]
    platform_libs: Vec<(String, PathBuf)>,

    /// Library index JSON file (defaults to <data-dir>/library_index.json)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    /// Download cache directory (defaults to <data-dir>/staging)
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Directory holding settings and the index
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List installed libraries
    List {
        /// Include platform-bundled libraries
        #[arg(long)]
        all: bool,

        /// Only libraries with a newer release available
        #[arg(long)]
        updatable: bool,

        /// Show libraries usable with this board and annotate compatibility
        #[arg(short = 'b', long)]
        fqbn: Option<Fqbn>,

        /// Only the library with this name
        name: Option<String>,
    },

    /// Search the library index
    Search {
        /// Terms matched against name, sentence and paragraph
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// Show the dependency closure of NAME[@VERSION]
    Deps { library: String },

    /// List example sketches of installed libraries
    Examples {
        /// Only the library with this name
        name: Option<String>,
    },

    /// Install libraries from the index, git repositories or zip archives
    Install {
        /// NAME[@VERSION], or URLs/paths with --git-url/--zip-path
        #[arg(required = true)]
        libraries: Vec<String>,

        /// Do not install dependencies
        #[arg(long)]
        no_deps: bool,

        /// Fail instead of replacing an installed version
        #[arg(long)]
        no_overwrite: bool,

        /// Install into the builtin directory
        #[arg(long = "install-in-builtin-dir")]
        install_in_builtin: bool,

        /// Treat arguments as git URLs (url[#ref])
        #[arg(long, conflicts_with = "zip_path")]
        git_url: bool,

        /// Treat arguments as paths to zip archives
        #[arg(long)]
        zip_path: bool,
    },

    /// Upgrade libraries (all of them when none are named)
    Upgrade {
        names: Vec<String>,

        /// Do not install new dependencies
        #[arg(long)]
        no_deps: bool,
    },

    /// Remove user or builtin libraries
    Uninstall {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Download release archives into the cache without installing
    Download {
        /// NAME[@VERSION]
        #[arg(required = true)]
        libraries: Vec<String>,
    },

    /// Change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Allow --git-url and --zip-path installs
    EnableUnsafeInstall,
    /// Disallow --git-url and --zip-path installs
    DisableUnsafeInstall,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_platform(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected ID=PATH, got '{}'", value)),
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Process exit status for a failed command.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<BoardlibError>()
        .map(BoardlibError::error_code)
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });

    match commands::run(args, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform() {
        let (id, path) = parse_platform("arduino:avr=/opt/avr/libraries").unwrap();
        assert_eq!(id, "arduino:avr");
        assert_eq!(path, PathBuf::from("/opt/avr/libraries"));

        assert!(parse_platform("arduino:avr").is_err());
        assert!(parse_platform("=/opt").is_err());
    }

    #[test]
    fn test_args_parse_install() {
        let args = Args::try_parse_from([
            "boardlib",
            "--sketchbook",
            "/tmp/libs",
            "install",
            "Servo@1.1.0",
            "--no-deps",
        ])
        .unwrap();
        match args.command {
            Command::Install {
                libraries, no_deps, ..
            } => {
                assert_eq!(libraries, vec!["Servo@1.1.0"]);
                assert!(no_deps);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(args.sketchbook, Some(PathBuf::from("/tmp/libs")));
    }

    #[test]
    fn test_git_and_zip_conflict() {
        let result = Args::try_parse_from(["boardlib", "install", "x", "--git-url", "--zip-path"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_exit_code_from_engine_error() {
        let err = anyhow::Error::new(BoardlibError::LibraryNotFound {
            name: "Servo".into(),
        });
        assert_eq!(exit_code(&err), 1);

        let err = anyhow::Error::new(BoardlibError::UnsafeInstallDisabled {
            env_var: "X",
        });
        assert_eq!(exit_code(&err), 5);
    }
}
