//! Command-line arguments and their mapping onto pipeline options

use anyhow::Result;
use clap::Parser;
use cluster_atlas_core::config::{Config, RunConfig, ToolsConfig};
use cluster_atlas_core::PipelineOptions;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cluster-atlas",
    version,
    about = "Split a thresholded cluster map into separate clusters and label them with atlases",
    long_about = "Reads a FEAT cluster table (e.g. cluster_zstat1_std.txt) and the matching cluster \
                  mask image (e.g. cluster_mask_zstat1.nii.gz). Every cluster larger than the \
                  threshold is written to its own binary mask with fslmaths, looked up in each \
                  atlas with atlasq, and summarised in one tab-delimited table.\n\n\
                  Requires FSL (fslmaths, atlasq) in PATH unless configured otherwise.",
    after_help = "EXAMPLES:\n  \
                  cluster-atlas cluster_zstat1_std.txt cluster_mask_zstat1.nii.gz \\\n    \
                  --atlases \"Juelich Histological Atlas\"\n\n  \
                  cluster-atlas cluster_zstat1_std.txt cluster_mask_zstat1.nii.gz --threshold 49 \\\n    \
                  --atlases \"Harvard-Oxford Cortical Structural Atlas\" \"Talairach Daemon Labels\""
)]
pub struct Cli {
    /// Cluster table written by FEAT
    pub table: PathBuf,

    /// Cluster mask image whose voxel values are cluster indices
    pub volume: PathBuf,

    /// Only clusters larger than this size are analysed
    #[arg(long, default_value_t = 99)]
    pub threshold: i32,

    /// Atlases to query, in output column order
    #[arg(long, num_args = 1.., required = true)]
    pub atlases: Vec<String>,

    /// TOML configuration file (tool paths, output locations, timeouts)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory for masks and the summary table
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory for per-mask atlas reports (defaults to the output directory)
    #[arg(long)]
    pub reports_dir: Option<PathBuf>,

    /// Seconds before an external tool call is killed
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Reject clusters without peak coordinates instead of leaving their labels empty
    #[arg(long)]
    pub require_peaks: bool,

    /// Parallel atlas lookups per label pass
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Also write the summary as JSON to this path
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Load the configuration file, if any, and apply command-line overrides
    pub fn config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => cluster_atlas_core::load_config(path)?,
            None => Config::default(),
        };

        if let Some(timeout) = self.timeout {
            config
                .tools
                .get_or_insert_with(ToolsConfig::default)
                .timeout_secs = Some(timeout);
        }
        if self.require_peaks || self.jobs.is_some() {
            let run = config.run.get_or_insert_with(RunConfig::default);
            if self.require_peaks {
                run.require_peaks = Some(true);
            }
            if let Some(jobs) = self.jobs {
                run.jobs = Some(jobs);
            }
        }

        Ok(config)
    }

    pub fn pipeline_options(&self, config: &Config) -> PipelineOptions {
        let mut options = PipelineOptions::from_config(
            config,
            self.table.clone(),
            self.volume.clone(),
            f64::from(self.threshold),
            self.atlases.clone(),
        );
        if let Some(dir) = &self.output_dir {
            options.output_dir = dir.clone();
            if self.reports_dir.is_none() && !has_reports_dir(config) {
                options.reports_dir = dir.clone();
            }
        }
        if let Some(dir) = &self.reports_dir {
            options.reports_dir = dir.clone();
        }
        options.json_path = self.json.clone();
        options
    }
}

fn has_reports_dir(config: &Config) -> bool {
    config
        .output
        .as_ref()
        .is_some_and(|o| o.reports_dir.is_some())
}
