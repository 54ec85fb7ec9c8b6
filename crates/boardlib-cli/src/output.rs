//! Rendering of command results as plain text or JSON.

use crate::OutputFormat;
use anyhow::Result;
use boardlib::{
    DependencyStatus, EntryOutcome, EntryStatus, InstallReport, InstalledLibrary, LibraryExamples,
    LibraryListing, LibraryRelease, Settings,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn listings(&self, rows: &[LibraryListing]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(rows);
        }
        if rows.is_empty() {
            println!("No libraries installed.");
            return Ok(());
        }
        println!(
            "{:<32} {:<12} {:<12} {:<24} {}",
            "Name", "Installed", "Available", "Location", "Compatible"
        );
        for row in rows {
            let lib = &row.library;
            let installed = lib.raw_version.as_deref().unwrap_or("-");
            let available = match &row.latest {
                Some(latest) if row.is_updatable() => latest.to_string(),
                _ => "-".to_string(),
            };
            let compatible = match row.compatible {
                Some(true) => "yes",
                Some(false) => "no",
                None => "",
            };
            println!(
                "{:<32} {:<12} {:<12} {:<24} {}",
                lib.name,
                installed,
                available,
                lib.location.to_string(),
                compatible
            );
        }
        Ok(())
    }

    pub fn releases(&self, hits: &[LibraryRelease]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(hits);
        }
        if hits.is_empty() {
            println!("No libraries matching your search.");
        }
        for release in hits {
            println!("{}@{}", release.name, release.version);
            if !release.sentence.is_empty() {
                println!("  {}", release.sentence);
            }
        }
        Ok(())
    }

    pub fn dependencies(&self, rows: &[DependencyStatus]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(rows);
        }
        for row in rows {
            match &row.version_installed {
                Some(installed) if *installed == row.version_required => {
                    println!("✓ {}@{} is already installed", row.name, row.version_required)
                }
                Some(installed) => println!(
                    "↑ {}@{} must be installed (replaces {})",
                    row.name, row.version_required, installed
                ),
                None => println!("✕ {}@{} must be installed", row.name, row.version_required),
            }
        }
        Ok(())
    }

    pub fn examples(&self, rows: &[LibraryExamples]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(rows);
        }
        if rows.is_empty() {
            println!("No libraries found.");
        }
        for row in rows {
            println!("Examples from library \"{}\"", row.library.name);
            for example in &row.examples {
                println!("  - {}", example.display());
            }
        }
        Ok(())
    }

    pub fn reports(&self, reports: &[InstallReport]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(reports);
        }
        for report in reports {
            for advisory in &report.advisories {
                eprintln!("WARNING: {}", advisory);
            }
            if report.outcomes.is_empty() {
                println!("Nothing to do.");
            }
            for outcome in &report.outcomes {
                println!("{}", describe(outcome));
            }
        }
        Ok(())
    }

    pub fn uninstalled(&self, removed: &[InstalledLibrary]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(removed);
        }
        for lib in removed {
            println!("Uninstalled {} from {}", lib.id(), lib.path.display());
        }
        Ok(())
    }

    pub fn downloads(&self, archives: &[PathBuf]) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(archives);
        }
        for archive in archives {
            println!("Downloaded {}", archive.display());
        }
        Ok(())
    }

    pub fn settings(&self, settings: &Settings, path: &Path) -> Result<()> {
        if self.format == OutputFormat::Json {
            return self.json(settings);
        }
        let state = if settings.library.enable_unsafe_install {
            "enabled"
        } else {
            "disabled"
        };
        println!("Unsafe installs {} in {}", state, path.display());
        Ok(())
    }
}

fn describe(outcome: &EntryOutcome) -> String {
    let id = match &outcome.version {
        Some(version) => format!("{}@{}", outcome.name, version),
        None => outcome.name.clone(),
    };
    let place = outcome
        .path
        .as_ref()
        .map(|p| format!(" in {}", p.display()))
        .unwrap_or_default();
    match &outcome.status {
        EntryStatus::Installed => format!("Installed {}{}", id, place),
        EntryStatus::Upgraded { from: Some(from) } => {
            format!("Upgraded {} from {}{}", id, from, place)
        }
        EntryStatus::Upgraded { from: None } => format!("Replaced {}{}", id, place),
        EntryStatus::AlreadyInstalled => format!("{} already installed", id),
        EntryStatus::Failed { error, .. } => format!("Failed to install {}: {}", id, error),
    }
}
