//! Cluster summary table parsing
//!
//! Reads the tab-delimited cluster table written by FEAT's `cluster` step
//! (e.g. `cluster_zstat1_std.txt`):
//!
//! ```text
//! Cluster Index	Voxels	P	-log10(P)	Z-MAX	Z-MAX X (mm)	Z-MAX Y (mm)	Z-MAX Z (mm)	...
//! 3	1204	1.2e-12	11.9	5.81	-42	-60	48	...
//! ```
//!
//! Only column 1 (cluster index), column 2 (size) and columns 6-8 (peak
//! coordinates) are used. Everything else is ignored.

use crate::error::{ClusterError, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Minimum number of columns a row needs to be considered at all
const MIN_COLUMNS: usize = 2;
/// Minimum number of columns a row needs to carry a peak coordinate
const PEAK_COLUMNS: usize = 8;
/// Zero-based column of the peak X coordinate (Y and Z follow)
const PEAK_X_COLUMN: usize = 5;

/// Cluster identifier as written in the table
///
/// `text` keeps the table's own spelling (e.g. leading zeros) so mask file
/// names match what the upstream tools produced; `value` is the voxel label
/// in the cluster mask volume.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterIndex {
    pub text: String,
    pub value: i64,
}

impl fmt::Display for ClusterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Peak-statistic coordinate in the analysis' native space (mm)
///
/// Displays as `x, y, z`. The spaces keep a negative x from being read as an
/// option flag when the text is passed as a single `atlasq -c` argument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.x, self.y, self.z)
    }
}

/// What to do with surviving rows that have no peak columns (fewer than 8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakPolicy {
    /// Keep the row with no peak. It is masked and reported, and its labels
    /// are the empty sentinel.
    #[default]
    Optional,
    /// Treat the row as malformed
    Require,
}

/// One surviving row of the cluster table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    /// Position in parse order; the join key for masks and reports
    pub position: usize,
    pub index: ClusterIndex,
    pub size: f64,
    pub peak: Option<Peak>,
}

/// Parse a cluster table, keeping rows whose size is strictly greater than
/// `threshold`
///
/// # Errors
///
/// Returns `ClusterError::Io` if the file cannot be opened and
/// `ClusterError::Parse` for malformed numeric fields, naming the line.
pub fn parse_cluster_table(
    path: &Path,
    threshold: f64,
    policy: PeakPolicy,
) -> Result<Vec<ClusterRecord>> {
    let file = File::open(path)?;
    parse_records(file, path, threshold, policy)
}

/// Parse cluster rows from any reader; `path` is only used in error messages
pub fn parse_records<R: Read>(
    reader: R,
    path: &Path,
    threshold: f64,
    policy: PeakPolicy,
) -> Result<Vec<ClusterRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let row = result.map_err(|e| ClusterError::Parse {
            path: path.to_path_buf(),
            line: e.position().map_or(0, csv::Position::line),
            message: e.to_string(),
        })?;
        let line = row.position().map_or(0, csv::Position::line);
        let fail = |message: String| ClusterError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };

        if row.len() < MIN_COLUMNS {
            continue;
        }

        let index_text = row[0].trim();
        let value: i64 = index_text
            .parse()
            .map_err(|_| fail(format!("invalid cluster index '{index_text}'")))?;

        let size_text = row[1].trim();
        let size: f64 = size_text
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| fail(format!("invalid cluster size '{size_text}'")))?;

        if size <= threshold {
            skipped += 1;
            continue;
        }

        let peak = if row.len() >= PEAK_COLUMNS {
            let coord = |offset: usize, axis: &str| -> Result<f64> {
                let text = row[PEAK_X_COLUMN + offset].trim();
                text.parse()
                    .ok()
                    .filter(|v: &f64| v.is_finite())
                    .ok_or_else(|| fail(format!("invalid peak {axis} coordinate '{text}'")))
            };
            Some(Peak {
                x: coord(0, "x")?,
                y: coord(1, "y")?,
                z: coord(2, "z")?,
            })
        } else if policy == PeakPolicy::Require {
            return Err(fail(format!(
                "cluster {index_text} has {} columns, peak coordinates need {PEAK_COLUMNS}",
                row.len()
            )));
        } else {
            None
        };

        records.push(ClusterRecord {
            position: records.len(),
            index: ClusterIndex {
                text: index_text.to_string(),
                value,
            },
            size,
            peak,
        });
    }

    debug!(
        "Parsed {} clusters above threshold {} from {} ({} at or below)",
        records.len(),
        threshold,
        path.display(),
        skipped
    );

    Ok(records)
}
