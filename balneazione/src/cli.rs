//! Définition et implémentation des commandes CLI
//!
//! - `update` : récolte, enrichissement, snapshot daté (défaut)
//! - `diff` : journal des différences entre les deux derniers snapshots

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use portale::{ClientConfig, HttpPortale};
use tracing::info;

use balneazione::config::{RunConfig, WORKING_DB};
use balneazione::enrich::RegionLookup;
use balneazione::harvest::Mapshaper;
use balneazione::report::RunReport;
use balneazione::versioning::{run_diff, DiffOutcome};

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest, enrich and archive a new snapshot
    Update(UpdateArgs),

    /// Append the difference between the two latest snapshots to the changelog
    Diff(DiffArgs),
}

#[derive(Args, Debug, Default)]
pub struct UpdateArgs {
    /// Working directory (défaut : env DATA_DIR / ./data)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Archive directory for dated databases (défaut : data dir)
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Maximum number of concurrent area requests (défaut : env MAX_WORKERS / 15)
    #[arg(long, alias = "jobs")]
    pub workers: Option<usize>,

    /// Province lookup CSV, local path or URL (défaut : env COMUNI_URL)
    #[arg(long)]
    pub lookup: Option<String>,

    /// Save the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub struct DiffArgs {
    /// Working directory (défaut : env DATA_DIR / ./data)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Archive directory to scan (défaut : data dir)
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Changelog file (défaut : <data dir>/updates.json)
    #[arg(long)]
    pub changelog: Option<PathBuf>,
}

/// Applique les arguments CLI par-dessus la configuration
fn apply_overrides(config: &mut RunConfig, args: &UpdateArgs) {
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &args.archive_dir {
        config.archive_dir = Some(dir.clone());
    }
    if let Some(workers) = args.workers {
        config.enrich_workers = workers.max(1);
    }
    if let Some(lookup) = &args.lookup {
        config.lookup_source = lookup.clone();
    }
}

/// Exécute la commande update
pub async fn cmd_update(mut config: RunConfig, args: &UpdateArgs) -> Result<()> {
    apply_overrides(&mut config, args);

    println!("=== Update ===");
    println!("Portal: {}", config.base_url);
    println!("Data dir: {}", config.data_dir.display());
    println!("Archive dir: {}", config.archive_dir().display());
    println!("Regions: {}", config.regions.len());
    println!("Workers: {}", config.enrich_workers);

    let ca_cert_pem = config
        .ca_cert
        .as_ref()
        .map(|path| {
            std::fs::read(path)
                .with_context(|| format!("Failed to read CA certificate: {}", path.display()))
        })
        .transpose()?;

    let portale = HttpPortale::new(ClientConfig {
        base_url: config.base_url.clone(),
        timeout: config.request_timeout(),
        ca_cert_pem,
        ..Default::default()
    })
    .context("Failed to build portal client")?;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build lookup client")?;
    let lookup = RegionLookup::load(&config.lookup_source, &http)
        .await
        .context("Failed to load province lookup")?;

    let simplifier = Arc::new(Mapshaper {
        program: config.mapshaper_bin.clone(),
        percentage: config.simplify_percentage,
    });

    match balneazione::run_update(&config, &portale, simplifier, &lookup).await {
        Ok(report) => {
            finish_report(&report, args)?;
            Ok(())
        }
        Err(failure) => {
            finish_report(&failure.report, args)?;
            Err(anyhow::Error::new(failure.error)).context("Update failed")
        }
    }
}

fn finish_report(report: &RunReport, args: &UpdateArgs) -> Result<()> {
    report.display();
    if let Some(path) = &args.report {
        report
            .save_to_file(path)
            .with_context(|| format!("Failed to save report: {}", path.display()))?;
        info!(path = %path.display(), "Report saved");
    }
    Ok(())
}

/// Exécute la commande diff
pub fn cmd_diff(mut config: RunConfig, args: &DiffArgs) -> Result<()> {
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &args.archive_dir {
        config.archive_dir = Some(dir.clone());
    }
    let archive_dir = config.archive_dir();
    let changelog = args
        .changelog
        .clone()
        .unwrap_or_else(|| config.changelog_path());

    let outcome = run_diff(&archive_dir, WORKING_DB, &changelog)
        .with_context(|| format!("Failed to diff snapshots in {}", archive_dir.display()))?;

    match outcome {
        DiffOutcome::NotEnoughSnapshots { found } => {
            println!("Not enough snapshots to compare ({} found)", found);
        }
        DiffOutcome::AlreadyRecorded { newer, last } => {
            println!("Snapshot {} already recorded (last entry: {})", newer, last);
        }
        DiffOutcome::NoChanges { older, newer } => {
            println!("No changes between {} and {}", older, newer);
        }
        DiffOutcome::Appended {
            older,
            newer,
            statements,
        } => {
            println!(
                "{} -> {}: {} statements appended to {}",
                older,
                newer,
                statements,
                changelog.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut config = RunConfig::default();
        let args = UpdateArgs {
            data_dir: Some(PathBuf::from("/srv/bal")),
            workers: Some(0),
            lookup: Some("comuni.csv".into()),
            ..Default::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.data_dir, PathBuf::from("/srv/bal"));
        assert_eq!(config.archive_dir(), PathBuf::from("/srv/bal"));
        assert_eq!(config.enrich_workers, 1);
        assert_eq!(config.lookup_source, "comuni.csv");
    }

    #[test]
    fn test_overrides_keep_defaults() {
        let mut config = RunConfig::default();
        apply_overrides(&mut config, &UpdateArgs::default());
        assert_eq!(config.enrich_workers, 15);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
    }
}
