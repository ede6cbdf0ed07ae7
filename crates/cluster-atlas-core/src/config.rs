//! Configuration loading
//!
//! ```toml
//! [tools]
//! mask_program = "fslmaths"
//! atlas_program = "atlasq"
//! atlas_args = ["ohi"]
//! timeout_secs = 300
//!
//! [output]
//! directory = "Split Cluster Masks"
//! summary_file = "cluster_summary.txt"
//!
//! [run]
//! require_peaks = false
//! jobs = 1
//! ```

use crate::atlas::FslAtlasQuery;
use crate::error::{ClusterError, Result};
use crate::mask::FslMaths;
use crate::table::PeakPolicy;
use crate::tool::{ToolCommand, DEFAULT_TIMEOUT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default directory for masks, reports and the summary table
pub const DEFAULT_OUTPUT_DIR: &str = "Split Cluster Masks";

/// Default summary table file name inside the output directory
pub const DEFAULT_SUMMARY_FILE: &str = "cluster_summary.txt";

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub tools: Option<ToolsConfig>,
    pub output: Option<OutputConfig>,
    pub run: Option<RunConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub mask_program: Option<String>,
    pub mask_args: Option<Vec<String>>,
    pub atlas_program: Option<String>,
    pub atlas_args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub directory: Option<PathBuf>,
    pub summary_file: Option<String>,
    pub reports_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub require_peaks: Option<bool>,
    pub jobs: Option<usize>,
}

impl Config {
    /// Deadline for a single external tool call
    pub fn tool_timeout(&self) -> Duration {
        self.tools
            .as_ref()
            .and_then(|t| t.timeout_secs)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs)
    }

    pub fn mask_command(&self) -> ToolCommand {
        let tools = self.tools.clone().unwrap_or_default();
        ToolCommand::new(tools.mask_program.unwrap_or_else(|| "fslmaths".to_string()))
            .with_leading_args(tools.mask_args.unwrap_or_default())
    }

    pub fn atlas_command(&self) -> ToolCommand {
        let tools = self.tools.clone().unwrap_or_default();
        ToolCommand::new(tools.atlas_program.unwrap_or_else(|| "atlasq".to_string()))
            .with_leading_args(tools.atlas_args.unwrap_or_else(|| vec!["ohi".to_string()]))
    }

    pub fn mask_extractor(&self) -> FslMaths {
        FslMaths::new(self.mask_command(), self.tool_timeout())
    }

    pub fn atlas_query(&self) -> FslAtlasQuery {
        FslAtlasQuery::new(self.atlas_command(), self.tool_timeout())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|o| o.directory.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    pub fn summary_file(&self) -> String {
        self.output
            .as_ref()
            .and_then(|o| o.summary_file.clone())
            .unwrap_or_else(|| DEFAULT_SUMMARY_FILE.to_string())
    }

    /// Report directory; the output directory unless configured
    pub fn reports_dir(&self) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|o| o.reports_dir.clone())
            .unwrap_or_else(|| self.output_dir())
    }

    pub fn peak_policy(&self) -> PeakPolicy {
        match self.run.as_ref().and_then(|r| r.require_peaks) {
            Some(true) => PeakPolicy::Require,
            _ => PeakPolicy::Optional,
        }
    }

    /// Worker count for atlas lookups, at least 1
    pub fn jobs(&self) -> usize {
        self.run
            .as_ref()
            .and_then(|r| r.jobs)
            .unwrap_or(1)
            .max(1)
    }
}

/// Load configuration from `path`
///
/// # Errors
///
/// Returns `ClusterError::Config` if the file does not exist or is not valid
/// configuration TOML, and `ClusterError::Io` if it cannot be read.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ClusterError::Config(format!("{}: file not found", path.display()))
        }
        _ => ClusterError::Io(e),
    })?;
    parse_config(&contents)
        .map_err(|e| ClusterError::Config(format!("{}: {e}", path.display())))
}

/// Parse configuration from TOML text
pub fn parse_config(contents: &str) -> std::result::Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.tool_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.mask_command(), ToolCommand::new("fslmaths"));
        assert_eq!(
            config.atlas_command(),
            ToolCommand::new("atlasq").with_leading_args(["ohi"])
        );
        assert_eq!(config.output_dir(), PathBuf::from("Split Cluster Masks"));
        assert_eq!(config.reports_dir(), config.output_dir());
        assert_eq!(config.summary_file(), "cluster_summary.txt");
        assert_eq!(config.peak_policy(), PeakPolicy::Optional);
        assert_eq!(config.jobs(), 1);
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [tools]
            mask_program = "/opt/fsl/bin/fslmaths"
            atlas_program = "/opt/fsl/bin/atlasquery"
            atlas_args = []
            timeout_secs = 30

            [output]
            directory = "masks"
            reports_dir = "reports"

            [run]
            require_peaks = true
            jobs = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert_eq!(config.mask_command().program, "/opt/fsl/bin/fslmaths");
        assert!(config.atlas_command().leading_args.is_empty());
        assert_eq!(config.output_dir(), PathBuf::from("masks"));
        assert_eq!(config.reports_dir(), PathBuf::from("reports"));
        assert_eq!(config.peak_policy(), PeakPolicy::Require);
        assert_eq!(config.jobs(), 4);
    }

    #[test]
    fn test_zero_jobs_clamped() {
        let config = parse_config("[run]\njobs = 0\n").unwrap();
        assert_eq!(config.jobs(), 1);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(parse_config("[tools]\nmask_prog = \"x\"\n").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ClusterError::Config(_)));
        assert!(err.to_string().contains("absent.toml: file not found"));
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[run\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
