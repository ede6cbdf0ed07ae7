use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing cluster tables, driving external tools and
/// assembling the result matrix
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The cluster table could not be parsed
    #[error("Failed to parse {}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    /// A label column does not have one entry per cluster record
    #[error("Label column for atlas '{atlas}' has {actual} entries, expected {expected}")]
    ColumnLengthMismatch {
        atlas: String,
        expected: usize,
        actual: usize,
    },

    /// A mask artifact does not line up with the matrix row at its position
    #[error("Mask for cluster {mask_index} does not match matrix row {position} (cluster {row_index})")]
    RowMismatch {
        position: usize,
        mask_index: String,
        row_index: String,
    },

    /// An external tool exited with a nonzero status
    #[error("{tool} failed (exit status {}): {detail}", .status.map_or_else(|| "signal".to_string(), |code| code.to_string()))]
    ExternalToolFailure {
        tool: String,
        status: Option<i32>,
        detail: String,
    },

    /// An external tool did not finish before its deadline and was killed
    #[error("{tool} timed out after {seconds}s")]
    ExternalToolTimeout { tool: String, seconds: u64 },

    /// The external tool executable could not be started
    #[error("{0} not found in PATH. Is FSL installed and sourced?")]
    ToolNotFound(String),

    /// The atlas query tool did not recognise the atlas name
    #[error("Invalid atlas name: {0}")]
    UnknownAtlas(String),

    /// Configuration file could not be read or deserialized
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Delimited text could not be written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON output could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClusterError {
    /// Whether the pipeline may skip the failing (cluster, atlas) pair and continue
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ExternalToolFailure { .. }
                | Self::ExternalToolTimeout { .. }
                | Self::UnknownAtlas(_)
        )
    }
}

/// A specialized Result type for cluster labelling operations
pub type Result<T> = std::result::Result<T, ClusterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        let failure = ClusterError::ExternalToolFailure {
            tool: "atlasq".to_string(),
            status: Some(1),
            detail: String::new(),
        };
        assert!(failure.is_recoverable());
        assert!(ClusterError::UnknownAtlas("Nope".to_string()).is_recoverable());

        let mismatch = ClusterError::ColumnLengthMismatch {
            atlas: "Juelich".to_string(),
            expected: 3,
            actual: 2,
        };
        assert!(!mismatch.is_recoverable());
    }

    #[test]
    fn test_parse_error_names_file_and_line() {
        let err = ClusterError::Parse {
            path: PathBuf::from("cluster_zstat1_std.txt"),
            line: 4,
            message: "invalid size 'abc'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse cluster_zstat1_std.txt:4: invalid size 'abc'"
        );
    }

    #[test]
    fn test_failure_without_exit_code() {
        let err = ClusterError::ExternalToolFailure {
            tool: "fslmaths".to_string(),
            status: None,
            detail: "killed".to_string(),
        };
        assert_eq!(err.to_string(), "fslmaths failed (exit status signal): killed");
    }
}
