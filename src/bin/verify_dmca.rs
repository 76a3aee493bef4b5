use anyhow::{Context, Result};
use clap::Parser;
use modverify::acquisition::{AssumeExists, DepotDownloader, ExistenceCheck, WorkshopPageCheck};
use modverify::depot::{self, locate_depot_downloader, DepotLayout};
use modverify::logging;
use modverify::manifest::{ManifestResolver, ManifestStore, ResolverOptions};
use modverify::verification::{RunOptions, VerificationRunner, VerificationStatus};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "verify_dmca")]
#[command(about = "Verify DMCA suspects against tracked workshop mods by manifest hashes", long_about = None)]
struct Cli {
    /// Job record to verify; rewritten in place with results
    #[arg(long)]
    dmca_export: Option<PathBuf>,
    /// DepotDownloader executable (otherwise configured or auto-detected)
    #[arg(long)]
    depot_path: Option<PathBuf>,
    /// Only verify entries that are neither filed nor taken down
    #[arg(long)]
    pending_only: bool,
    /// Print tool and cache locations
    #[arg(long)]
    show_config: bool,
    /// Delete all cached manifests and the id mapping
    #[arg(long)]
    clear_cache: bool,
    /// Skip the workshop page check before downloading
    #[arg(long)]
    no_existence_check: bool,
    /// Per-item download timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_path = cli.dmca_export.as_deref().map(log_file_for);
    let _guard = logging::init_logger(log_path.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("FATAL ERROR: {:#}", err);
            eprintln!("ERROR: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// `<dir>/<stem>_verify.log` next to the job record.
fn log_file_for(export: &Path) -> PathBuf {
    let stem = export
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dmca_export".into());
    export.with_file_name(format!("{stem}_verify.log"))
}

fn run(cli: Cli) -> Result<()> {
    let mut config = depot::load_or_default()?;
    if let Some(timeout) = cli.timeout {
        config.acquisition.timeout_secs = timeout;
    }

    let tool_path = match cli.depot_path.clone() {
        Some(path) => path,
        None => locate_depot_downloader(&mut config)?.context("DepotDownloader not found")?,
    };
    let layout = DepotLayout::new(&tool_path, &config.acquisition.app_id);
    info!("DepotDownloader path: {}", layout.tool_path.display());
    info!("Depot directory: {}", layout.depot_dir.display());

    if cli.clear_cache {
        return layout.clear_cache();
    }

    if cli.show_config {
        let store = ManifestStore::open(&layout.depot_dir);
        println!("DepotDownloader: {}", layout.tool_path.display());
        println!("Depot dir: {}", layout.depot_dir.display());
        println!("Mapped items: {}", store.len());
        return Ok(());
    }

    let export = cli
        .dmca_export
        .context("--dmca-export is required unless --show-config or --clear-cache is given")?;

    let acquirer = DepotDownloader::new(&layout.tool_path, config.acquisition.app_id.clone());
    let existence: Box<dyn ExistenceCheck> =
        if cli.no_existence_check || !config.acquisition.existence_check {
            Box::new(AssumeExists)
        } else {
            Box::new(WorkshopPageCheck::new(Duration::from_secs(
                config.acquisition.existence_timeout_secs,
            ))?)
        };

    let resolver = ManifestResolver::new(
        ManifestStore::open(&layout.depot_dir),
        &acquirer,
        existence.as_ref(),
        ResolverOptions::from_config(&config),
    );
    let mut runner = VerificationRunner::new(
        resolver,
        VerificationStatus::new(),
        RunOptions {
            pending_only: cli.pending_only,
        },
    );
    runner.run_file(&export)?;

    info!("Output saved: {}", export.display());
    println!("VERIFICATION_COMPLETE");
    Ok(())
}
