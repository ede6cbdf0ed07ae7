//! cluster-atlas-core: cluster table post-processing for FSL FEAT results
//!
//! This crate provides:
//! - Parsing of FEAT cluster tables with an exclusive size threshold
//! - Per-cluster binary mask extraction through `fslmaths`
//! - Atlas label lookup through `atlasq`, at the peak coordinate and over each mask
//! - Assembly of a row-aligned result matrix and its tab-delimited rendering
//!
//! External tools are reached through the [`MaskExtractor`] and
//! [`AtlasQuery`] traits so the pipeline can run against any compatible
//! implementation.
//!
//! ## System Requirements
//!
//! - **FSL**: `fslmaths` and `atlasq` must be installed and available in `PATH`
//!   (or configured explicitly, see [`config`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! use cluster_atlas_core::{run_pipeline, Config, PipelineOptions};
//!
//! let config = Config::default();
//! let options = PipelineOptions::from_config(
//!     &config,
//!     "cluster_zstat1_std.txt".into(),
//!     "cluster_mask_zstat1.nii.gz".into(),
//!     99.0,
//!     vec!["Juelich Histological Atlas".to_string()],
//! );
//! let summary = run_pipeline(&options, &config.mask_extractor(), &config.atlas_query())?;
//! println!("{}", summary.matrix.render()?);
//! # Ok::<(), cluster_atlas_core::ClusterError>(())
//! ```

pub mod atlas;
pub mod config;
pub mod error;
pub mod mask;
pub mod matrix;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod table;
pub mod tool;

pub use atlas::{parse_coordinate_response, AtlasQuery, AtlasResponse, FslAtlasQuery};
pub use config::{load_config, Config};
pub use error::{ClusterError, Result};
pub use mask::{extract_masks, mask_file_name, FslMaths, MaskArtifact, MaskExtractor};
pub use matrix::{LabelColumn, ResultMatrix, ResultMatrixBuilder};
pub use pipeline::{run_pipeline, PipelineOptions, PipelineSummary, SkipEvent, SkipStage};
pub use report::{report, report_all, report_file_name};
pub use resolver::{resolve, resolve_column, LabelPass, SENTINEL_LABEL};
pub use table::{parse_cluster_table, ClusterIndex, ClusterRecord, Peak, PeakPolicy};
pub use tool::{ToolCommand, ToolOutput};
