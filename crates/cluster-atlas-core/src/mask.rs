//! Per-cluster binary mask extraction
//!
//! Each surviving cluster is isolated from the labelled cluster volume with
//!
//! ```text
//! fslmaths cluster_mask_zstat1.nii.gz -thr 3 -uthr 3 -bin output_cluster_3.nii.gz
//! ```

use crate::error::{ClusterError, Result};
use crate::table::{ClusterIndex, ClusterRecord};
use crate::tool::{ToolCommand, DEFAULT_TIMEOUT};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Extension of generated mask volumes
pub const MASK_EXTENSION: &str = ".nii.gz";

/// Produces a binary volume of the voxels equal to one cluster index
pub trait MaskExtractor {
    fn extract(&self, volume: &Path, index: &ClusterIndex, output: &Path) -> Result<()>;
}

/// `fslmaths`-compatible threshold/binarize tool invoked as a subprocess
#[derive(Debug, Clone)]
pub struct FslMaths {
    command: ToolCommand,
    timeout: Duration,
}

impl Default for FslMaths {
    fn default() -> Self {
        Self::new(ToolCommand::new("fslmaths"), DEFAULT_TIMEOUT)
    }
}

impl FslMaths {
    #[must_use]
    pub fn new(command: ToolCommand, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

impl MaskExtractor for FslMaths {
    fn extract(&self, volume: &Path, index: &ClusterIndex, output: &Path) -> Result<()> {
        let value = index.value.to_string();
        self.command.run(
            [
                volume.as_os_str(),
                OsStr::new("-thr"),
                OsStr::new(&value),
                OsStr::new("-uthr"),
                OsStr::new(&value),
                OsStr::new("-bin"),
                output.as_os_str(),
            ],
            self.timeout,
        )?;
        Ok(())
    }
}

/// A generated mask, tagged with the position of its cluster record
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MaskArtifact {
    pub position: usize,
    pub index: ClusterIndex,
    pub path: PathBuf,
}

impl MaskArtifact {
    /// File name without the volume extension, e.g. `output_cluster_3`
    #[must_use]
    pub fn stem(&self) -> String {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        name.strip_suffix(MASK_EXTENSION)
            .or_else(|| name.strip_suffix(".nii"))
            .unwrap_or(name.as_str())
            .to_string()
    }
}

/// A cluster whose mask could not be produced
#[derive(Debug)]
pub struct MaskFailure {
    pub position: usize,
    pub index: ClusterIndex,
    pub error: ClusterError,
}

/// Deterministic mask file name for a cluster index
#[must_use]
pub fn mask_file_name(index: &ClusterIndex) -> String {
    format!("output_cluster_{}{MASK_EXTENSION}", index.text)
}

/// Extract one mask per record, in record order, into `output_dir`
///
/// Existing masks with the same name are overwritten. Recoverable tool
/// failures are returned alongside the produced masks instead of aborting.
///
/// # Errors
///
/// Returns an error if `output_dir` cannot be created or a non-recoverable
/// error occurs (e.g. the extractor executable is missing).
pub fn extract_masks(
    extractor: &dyn MaskExtractor,
    volume: &Path,
    records: &[ClusterRecord],
    output_dir: &Path,
) -> Result<(Vec<MaskArtifact>, Vec<MaskFailure>)> {
    fs::create_dir_all(output_dir)?;

    let mut artifacts = Vec::with_capacity(records.len());
    let mut failures = Vec::new();

    for record in records {
        let path = output_dir.join(mask_file_name(&record.index));
        debug!("Extracting cluster {} to {}", record.index, path.display());

        match extractor.extract(volume, &record.index, &path) {
            Ok(()) => artifacts.push(MaskArtifact {
                position: record.position,
                index: record.index.clone(),
                path,
            }),
            Err(error) if error.is_recoverable() => {
                warn!("Skipping mask for cluster {}: {}", record.index, error);
                failures.push(MaskFailure {
                    position: record.position,
                    index: record.index.clone(),
                    error,
                });
            }
            Err(error) => return Err(error),
        }
    }

    Ok((artifacts, failures))
}
