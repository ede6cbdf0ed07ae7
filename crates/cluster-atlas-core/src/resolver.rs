//! Peak-coordinate label resolution
//!
//! One pass per atlas produces one label for every cluster record, in record
//! order. A failed lookup still yields a label (the empty sentinel) so that
//! the column lines up with the matrix rows.

use crate::atlas::{parse_coordinate_response, AtlasQuery, AtlasResponse};
use crate::error::{ClusterError, Result};
use crate::matrix::LabelColumn;
use crate::table::{ClusterIndex, ClusterRecord, Peak};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Label recorded when no structure could be resolved
pub const SENTINEL_LABEL: &str = "";

/// A (cluster, atlas) lookup that fell back to the sentinel
#[derive(Debug)]
pub struct LabelSkip {
    pub position: usize,
    pub index: ClusterIndex,
    pub atlas: String,
    pub error: ClusterError,
}

/// Output of one atlas pass
#[derive(Debug)]
pub struct LabelPass {
    pub atlas: String,
    pub labels: LabelColumn,
    pub skipped: Vec<LabelSkip>,
}

/// Resolve the label at `peak` in `atlas`
///
/// A response without a label marker is a legitimate empty label.
///
/// # Errors
///
/// Returns `ClusterError::UnknownAtlas` if the tool rejects the atlas name,
/// and propagates tool failures and timeouts.
pub fn resolve(query: &dyn AtlasQuery, peak: &Peak, atlas: &str) -> Result<String> {
    let stdout = query.query_coordinate(atlas, peak)?;
    match parse_coordinate_response(&stdout) {
        AtlasResponse::InvalidAtlas => Err(ClusterError::UnknownAtlas(atlas.to_string())),
        response => Ok(response.into_label()),
    }
}

/// Resolve one label per record for `atlas`
///
/// With `jobs > 1` the lookups run on a dedicated thread pool; labels are
/// still placed by record position.
///
/// # Errors
///
/// Only non-recoverable errors (e.g. the query tool is missing) are returned.
/// Recoverable failures become sentinel labels listed in `skipped`.
pub fn resolve_column(
    query: &dyn AtlasQuery,
    records: &[ClusterRecord],
    atlas: &str,
    jobs: usize,
) -> Result<LabelPass> {
    let lookup = |record: &ClusterRecord| -> Option<Result<String>> {
        record.peak.as_ref().map(|peak| resolve(query, peak, atlas))
    };

    let outcomes: Vec<Option<Result<String>>> = if jobs > 1 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .map_err(|e| ClusterError::Config(format!("failed to start {jobs} workers: {e}")))?;
        pool.install(|| records.par_iter().map(lookup).collect())
    } else {
        records.iter().map(lookup).collect()
    };

    let mut labels = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();

    for (record, outcome) in records.iter().zip(outcomes) {
        match outcome {
            None => {
                debug!("Cluster {} has no peak coordinate, label left empty", record.index);
                labels.push(SENTINEL_LABEL.to_string());
            }
            Some(Ok(label)) => labels.push(label),
            Some(Err(error)) if error.is_recoverable() => {
                warn!(
                    "No {} label for cluster {}: {}",
                    atlas, record.index, error
                );
                labels.push(SENTINEL_LABEL.to_string());
                skipped.push(LabelSkip {
                    position: record.position,
                    index: record.index.clone(),
                    atlas: atlas.to_string(),
                    error,
                });
            }
            Some(Err(error)) => return Err(error),
        }
    }

    Ok(LabelPass {
        atlas: atlas.to_string(),
        labels,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Answers with the x coordinate as label; fails for x == 13
    struct ScriptedQuery;

    impl AtlasQuery for ScriptedQuery {
        fn query_overlap(&self, _atlas: &str, _mask: &Path) -> Result<String> {
            unreachable!("overlap mode is not used by the resolver")
        }

        fn query_coordinate(&self, atlas: &str, peak: &Peak) -> Result<String> {
            if atlas == "Bogus" {
                return Ok("Invalid atlas name. Try one of:\nJuelich\n".to_string());
            }
            if peak.x == 13.0 {
                return Err(ClusterError::ExternalToolFailure {
                    tool: "atlasq".to_string(),
                    status: Some(1),
                    detail: String::new(),
                });
            }
            if peak.x == 0.0 {
                return Ok(format!("<b>{atlas}</b>\n"));
            }
            Ok(format!("<b>{atlas}</b><br>region {}\n", peak.x))
        }
    }

    fn records(xs: &[Option<f64>]) -> Vec<ClusterRecord> {
        xs.iter()
            .enumerate()
            .map(|(position, x)| ClusterRecord {
                position,
                index: ClusterIndex {
                    text: (position * 10 + 1).to_string(),
                    value: (position * 10 + 1) as i64,
                },
                size: 120.0,
                peak: x.map(|x| Peak { x, y: 0.0, z: 0.0 }),
            })
            .collect()
    }

    #[test]
    fn test_resolve_label_and_empty() {
        let peak = Peak {
            x: 4.0,
            y: 0.0,
            z: 0.0,
        };
        assert_eq!(resolve(&ScriptedQuery, &peak, "Juelich").unwrap(), "region 4");

        let origin = Peak {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        assert_eq!(resolve(&ScriptedQuery, &origin, "Juelich").unwrap(), "");
    }

    #[test]
    fn test_resolve_unknown_atlas() {
        let peak = Peak {
            x: 4.0,
            y: 0.0,
            z: 0.0,
        };
        let err = resolve(&ScriptedQuery, &peak, "Bogus").unwrap_err();
        assert!(matches!(err, ClusterError::UnknownAtlas(_)));
    }

    #[test]
    fn test_failure_keeps_column_aligned() {
        let records = records(&[Some(1.0), Some(13.0), None, Some(2.0)]);
        let pass = resolve_column(&ScriptedQuery, &records, "Juelich", 1).unwrap();

        assert_eq!(pass.labels.len(), records.len());
        assert_eq!(pass.labels, vec!["region 1", "", "", "region 2"]);
        assert_eq!(pass.skipped.len(), 1);
        assert_eq!(pass.skipped[0].position, 1);
        assert_eq!(pass.skipped[0].index.text, "11");
    }

    #[test]
    fn test_unknown_atlas_fills_sentinels() {
        let records = records(&[Some(1.0), Some(2.0)]);
        let pass = resolve_column(&ScriptedQuery, &records, "Bogus", 1).unwrap();
        assert_eq!(pass.labels, vec!["", ""]);
        assert_eq!(pass.skipped.len(), 2);
    }

    #[test]
    fn test_parallel_pass_preserves_order() {
        let xs: Vec<Option<f64>> = (1..=64).map(|x| Some(f64::from(x))).collect();
        let records = records(&xs);
        let sequential = resolve_column(&ScriptedQuery, &records, "Juelich", 1).unwrap();
        let parallel = resolve_column(&ScriptedQuery, &records, "Juelich", 4).unwrap();

        assert_eq!(sequential.labels, parallel.labels);
        assert_eq!(parallel.skipped.len(), 1);
        assert_eq!(parallel.labels[12], "");
        assert_eq!(parallel.labels[63], "region 64");
    }
}
