//! Per-mask atlas overlap reports
//!
//! For every (mask, atlas) pair the raw `atlasq -m` output is saved as
//! `<mask stem>_<atlas>.txt`, headed by the cluster name, its size and the
//! atlas. The size comes from the matrix row at the mask's position.

use crate::atlas::AtlasQuery;
use crate::error::{ClusterError, Result};
use crate::mask::MaskArtifact;
use crate::matrix::{MatrixRow, ResultMatrix};
use crate::table::ClusterIndex;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A (mask, atlas) report that was not written
#[derive(Debug)]
pub struct ReportSkip {
    pub position: usize,
    pub index: ClusterIndex,
    pub mask: PathBuf,
    pub atlas: String,
    pub error: ClusterError,
}

/// Report file name for a mask stem and atlas
///
/// Path separators in atlas names are replaced so the report always lands in
/// the report directory.
#[must_use]
pub fn report_file_name(stem: &str, atlas: &str) -> String {
    let atlas: String = atlas
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("{stem}_{atlas}.txt")
}

/// Matrix row joined to `mask` by position
///
/// # Errors
///
/// Returns `ClusterError::RowMismatch` if there is no row at the mask's
/// position or the row describes a different cluster.
pub fn joined_row<'m>(matrix: &'m ResultMatrix, mask: &MaskArtifact) -> Result<&'m MatrixRow> {
    match matrix.row(mask.position) {
        Some(row) if row.index == mask.index => Ok(row),
        other => Err(ClusterError::RowMismatch {
            position: mask.position,
            mask_index: mask.index.text.clone(),
            row_index: other.map_or_else(|| "none".to_string(), |row| row.index.text.clone()),
        }),
    }
}

/// Query `atlas` with `mask` and write the report into `report_dir`
///
/// # Errors
///
/// Returns `RowMismatch` if the positional join fails, the query error if
/// the atlas lookup fails, or an I/O error if the report cannot be written.
pub fn report(
    query: &dyn AtlasQuery,
    mask: &MaskArtifact,
    atlas: &str,
    matrix: &ResultMatrix,
    report_dir: &Path,
) -> Result<PathBuf> {
    let row = joined_row(matrix, mask)?;
    let stdout = query.query_overlap(atlas, &mask.path)?;

    let stem = mask.stem();
    let mut body = String::new();
    let _ = writeln!(body, "Cluster: {stem}");
    let _ = writeln!(body, "Size: {}", row.size);
    let _ = writeln!(body, "Atlas: {atlas}");
    body.push('\n');
    body.push_str(&stdout);

    let path = report_dir.join(report_file_name(&stem, atlas));
    fs::write(&path, body)?;
    info!("Results saved to: {}", path.display());
    Ok(path)
}

/// Write one report per (mask, atlas) pair, masks outermost
///
/// # Errors
///
/// Only a broken positional join or a non-recoverable error aborts; failed
/// lookups are returned as skips.
pub fn report_all(
    query: &dyn AtlasQuery,
    masks: &[MaskArtifact],
    atlases: &[String],
    matrix: &ResultMatrix,
    report_dir: &Path,
) -> Result<(Vec<PathBuf>, Vec<ReportSkip>)> {
    fs::create_dir_all(report_dir)?;

    let mut written = Vec::with_capacity(masks.len() * atlases.len());
    let mut skipped = Vec::new();

    for mask in masks {
        for atlas in atlases {
            match report(query, mask, atlas, matrix, report_dir) {
                Ok(path) => written.push(path),
                Err(error) if error.is_recoverable() => {
                    warn!(
                        "Skipping {} report for {}: {}",
                        atlas,
                        mask.path.display(),
                        error
                    );
                    skipped.push(ReportSkip {
                        position: mask.position,
                        index: mask.index.clone(),
                        mask: mask.path.clone(),
                        atlas: atlas.clone(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }

    Ok((written, skipped))
}
