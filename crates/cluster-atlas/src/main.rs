//! cluster-atlas - Split FEAT cluster maps and label clusters with atlases
//!
//! Usage:
//!   cluster-atlas <TABLE> <VOLUME> --atlases <NAME>... [--threshold 99]
//!
//! Per-cluster tool failures are logged and skipped; the exit status is
//! nonzero only when the run cannot produce a consistent result table.

use anyhow::{Context as _, Result};
use clap::Parser;
use cluster_atlas_core::run_pipeline;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config()?;
    let options = cli.pipeline_options(&config);

    let summary = run_pipeline(&options, &config.mask_extractor(), &config.atlas_query())
        .with_context(|| format!("Failed to process {}", options.table.display()))?;

    for skip in &summary.skipped {
        warn!(
            "Skipped {:?} for cluster {}{}: {}",
            skip.stage,
            skip.cluster,
            skip.atlas
                .as_ref()
                .map(|atlas| format!(" ({atlas})"))
                .unwrap_or_default(),
            skip.reason
        );
    }

    info!(
        "{} clusters, {} masks, {} reports",
        summary.records.len(),
        summary.masks.len(),
        summary.reports.len()
    );

    println!();
    println!("List of separate cluster image files:");
    for mask in &summary.masks {
        println!("{}", mask.path.display());
    }
    println!();
    println!("Summary table: {}", summary.summary_path.display());

    Ok(())
}
