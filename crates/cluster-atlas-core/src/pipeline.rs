//! End-to-end run: table → matrix → summary table → masks → reports

use crate::atlas::AtlasQuery;
use crate::config::Config;
use crate::error::Result;
use crate::mask::{extract_masks, MaskArtifact, MaskExtractor};
use crate::matrix::{ResultMatrix, ResultMatrixBuilder};
use crate::report::report_all;
use crate::resolver::resolve_column;
use crate::table::{parse_cluster_table, ClusterRecord, PeakPolicy};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything a single run needs besides the external tools
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub table: PathBuf,
    pub volume: PathBuf,
    pub threshold: f64,
    pub atlases: Vec<String>,
    pub peak_policy: PeakPolicy,
    pub jobs: usize,
    pub output_dir: PathBuf,
    pub summary_file: String,
    pub reports_dir: PathBuf,
    pub json_path: Option<PathBuf>,
}

impl PipelineOptions {
    /// Options for `table`/`volume` with every other setting taken from `config`
    pub fn from_config(
        config: &Config,
        table: PathBuf,
        volume: PathBuf,
        threshold: f64,
        atlases: Vec<String>,
    ) -> Self {
        Self {
            table,
            volume,
            threshold,
            atlases,
            peak_policy: config.peak_policy(),
            jobs: config.jobs(),
            output_dir: config.output_dir(),
            summary_file: config.summary_file(),
            reports_dir: config.reports_dir(),
            json_path: None,
        }
    }
}

/// Pipeline stage in which a (cluster, atlas) pair was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipStage {
    Label,
    Mask,
    Report,
}

/// A recoverable failure surfaced to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipEvent {
    pub stage: SkipStage,
    pub position: usize,
    pub cluster: String,
    pub atlas: Option<String>,
    pub reason: String,
}

/// Artifacts and diagnostics of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub records: Vec<ClusterRecord>,
    pub matrix: ResultMatrix,
    pub summary_path: PathBuf,
    pub json_path: Option<PathBuf>,
    pub masks: Vec<MaskArtifact>,
    pub reports: Vec<PathBuf>,
    pub skipped: Vec<SkipEvent>,
}

/// Run the whole pipeline
///
/// # Errors
///
/// Fails on table parse errors, broken row alignment, missing tools and I/O
/// errors on the output directories. Failed lookups and extractions for
/// individual clusters are reported in `PipelineSummary::skipped`.
pub fn run_pipeline(
    options: &PipelineOptions,
    extractor: &dyn MaskExtractor,
    query: &dyn AtlasQuery,
) -> Result<PipelineSummary> {
    info!(
        "Only clusters larger than threshold = {} are analysed.",
        options.threshold
    );

    let records = parse_cluster_table(&options.table, options.threshold, options.peak_policy)?;
    info!("{} clusters above threshold", records.len());

    let mut skipped = Vec::new();
    let mut builder = ResultMatrixBuilder::seed(&records);

    for atlas in &options.atlases {
        info!("Resolving peak labels with \"{atlas}\"");
        let pass = resolve_column(query, &records, atlas, options.jobs)?;
        skipped.extend(pass.skipped.into_iter().map(|skip| SkipEvent {
            stage: SkipStage::Label,
            position: skip.position,
            cluster: skip.index.text,
            atlas: Some(skip.atlas),
            reason: skip.error.to_string(),
        }));
        builder.append_label_column(&pass.atlas, pass.labels)?;
    }

    let matrix = builder.finalize();

    fs::create_dir_all(&options.output_dir)?;
    let summary_path = options.output_dir.join(&options.summary_file);
    matrix.write_tsv(&summary_path)?;
    info!("Summary table saved to: {}", summary_path.display());

    if let Some(json_path) = &options.json_path {
        matrix.write_json(json_path)?;
        info!("Summary JSON saved to: {}", json_path.display());
    }

    let (masks, mask_failures) =
        extract_masks(extractor, &options.volume, &records, &options.output_dir)?;
    skipped.extend(mask_failures.into_iter().map(|failure| SkipEvent {
        stage: SkipStage::Mask,
        position: failure.position,
        cluster: failure.index.text,
        atlas: None,
        reason: failure.error.to_string(),
    }));

    let (reports, report_skips) = report_all(
        query,
        &masks,
        &options.atlases,
        &matrix,
        &options.reports_dir,
    )?;
    skipped.extend(report_skips.into_iter().map(|skip| SkipEvent {
        stage: SkipStage::Report,
        position: skip.position,
        cluster: skip.index.text,
        atlas: Some(skip.atlas),
        reason: skip.error.to_string(),
    }));

    if !skipped.is_empty() {
        warn!("{} lookups or extractions were skipped", skipped.len());
    }

    Ok(PipelineSummary {
        records,
        matrix,
        summary_path,
        json_path: options.json_path.clone(),
        masks,
        reports,
        skipped,
    })
}
