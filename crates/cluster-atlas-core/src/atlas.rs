//! Atlas lookup through FSL's `atlasq`
//!
//! Two query modes are used:
//!
//! ```text
//! atlasq ohi -a "Juelich Histological Atlas" -m output_cluster_3.nii.gz
//! atlasq ohi -a "Juelich Histological Atlas" -c "-42, -60, 48"
//! ```
//!
//! Mask mode prints a multi-line overlap report that is stored verbatim.
//! Coordinate mode prints the atlas name followed by `<br>` and the labels,
//! e.g. `<b>Juelich Histological Atlas</b><br>35% GM Superior parietal lobule 7A`.

use crate::error::{ClusterError, Result};
use crate::table::Peak;
use crate::tool::{ToolCommand, DEFAULT_TIMEOUT};
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

/// Phrase printed by `atlasq` for an atlas name it does not know
pub const INVALID_ATLAS_MARKER: &str = "Invalid atlas name";

/// Separator between the atlas title and the label in coordinate mode
pub const LABEL_MARKER: &str = "<br>";

/// Lookup of anatomical structures in a named atlas
///
/// Both methods return the tool's raw stdout on success.
pub trait AtlasQuery: Sync {
    /// Structures overlapping a binary mask volume
    fn query_overlap(&self, atlas: &str, mask: &Path) -> Result<String>;

    /// Structures at a single coordinate
    fn query_coordinate(&self, atlas: &str, peak: &Peak) -> Result<String>;
}

/// Interpretation of a coordinate-mode response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtlasResponse {
    /// Text after the first label marker
    Label(String),
    /// No marker in the response: the atlas has no structure at this point
    NoLabel,
    /// The tool rejected the atlas name
    InvalidAtlas,
}

impl AtlasResponse {
    /// The label cell for this response; the empty string when there is none
    #[must_use]
    pub fn into_label(self) -> String {
        match self {
            Self::Label(label) => label,
            Self::NoLabel | Self::InvalidAtlas => String::new(),
        }
    }
}

/// Parse `atlasq` coordinate-mode output
#[must_use]
pub fn parse_coordinate_response(stdout: &str) -> AtlasResponse {
    if is_invalid_atlas(stdout) {
        return AtlasResponse::InvalidAtlas;
    }
    match stdout.split_once(LABEL_MARKER) {
        Some((_, label)) => AtlasResponse::Label(label.trim().to_string()),
        None => AtlasResponse::NoLabel,
    }
}

#[must_use]
pub fn is_invalid_atlas(stdout: &str) -> bool {
    stdout.contains(INVALID_ATLAS_MARKER)
}

/// `atlasq`-compatible tool invoked as a subprocess
#[derive(Debug, Clone)]
pub struct FslAtlasQuery {
    command: ToolCommand,
    timeout: Duration,
}

impl Default for FslAtlasQuery {
    fn default() -> Self {
        Self::new(ToolCommand::new("atlasq").with_leading_args(["ohi"]), DEFAULT_TIMEOUT)
    }
}

impl FslAtlasQuery {
    #[must_use]
    pub fn new(command: ToolCommand, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    fn query(&self, atlas: &str, mode: &str, target: &OsStr) -> Result<String> {
        let output = self.command.run(
            [OsStr::new("-a"), OsStr::new(atlas), OsStr::new(mode), target],
            self.timeout,
        )?;
        if is_invalid_atlas(&output.stdout) {
            return Err(ClusterError::UnknownAtlas(atlas.to_string()));
        }
        Ok(output.stdout)
    }
}

impl AtlasQuery for FslAtlasQuery {
    fn query_overlap(&self, atlas: &str, mask: &Path) -> Result<String> {
        self.query(atlas, "-m", mask.as_os_str())
    }

    fn query_coordinate(&self, atlas: &str, peak: &Peak) -> Result<String> {
        let coordinate = peak.to_string();
        self.query(atlas, "-c", OsStr::new(&coordinate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUELICH_HIT: &str =
        "<b>Juelich Histological Atlas</b><br>35% GM Superior parietal lobule 7A, 12% GM Visual cortex V1\n";
    const NO_STRUCTURE: &str = "<b>Juelich Histological Atlas</b>\n";
    const INVALID: &str = "Invalid atlas name. Try one of:\nHarvard-Oxford Cortical Structural Atlas\nJuelich Histological Atlas\n";

    #[test]
    fn test_label_after_first_marker() {
        assert_eq!(
            parse_coordinate_response(JUELICH_HIT),
            AtlasResponse::Label(
                "35% GM Superior parietal lobule 7A, 12% GM Visual cortex V1".to_string()
            )
        );
    }

    #[test]
    fn test_only_first_marker_splits() {
        let response = parse_coordinate_response("<b>A</b><br>first<br>second");
        assert_eq!(response.into_label(), "first<br>second");
    }

    #[test]
    fn test_no_marker_is_empty_label() {
        let response = parse_coordinate_response(NO_STRUCTURE);
        assert_eq!(response, AtlasResponse::NoLabel);
        assert_eq!(response.into_label(), "");
    }

    #[test]
    fn test_invalid_atlas_detected() {
        assert_eq!(
            parse_coordinate_response(INVALID),
            AtlasResponse::InvalidAtlas
        );
        assert!(is_invalid_atlas(INVALID));
        assert!(!is_invalid_atlas(JUELICH_HIT));
    }

    #[cfg(unix)]
    #[test]
    fn test_fsl_query_passes_arguments() {
        // `sh -c 'echo "$@"' atlasq ...` echoes the arguments back
        let query = FslAtlasQuery::new(
            ToolCommand::new("sh").with_leading_args(["-c", "echo \"$@\"", "atlasq", "ohi"]),
            DEFAULT_TIMEOUT,
        );
        let peak = Peak {
            x: -42.0,
            y: -60.5,
            z: 48.0,
        };
        let stdout = query.query_coordinate("Juelich", &peak).unwrap();
        assert_eq!(stdout.trim(), "ohi -a Juelich -c -42, -60.5, 48");

        let stdout = query
            .query_overlap("Juelich", Path::new("masks/output_cluster_3.nii.gz"))
            .unwrap();
        assert_eq!(stdout.trim(), "ohi -a Juelich -m masks/output_cluster_3.nii.gz");
    }

    /// Rejects a `-c` value that looks like an option, as argparse does for a
    /// dash-prefixed token with no spaces
    #[cfg(unix)]
    const OPTION_STRICT_ATLASQ: &str = r#"[ "$3" = "-c" ] || exit 3
case "$4" in
  -*" "*) ;;
  -*) echo "atlasq: error: argument -c/--coord: expected one argument" >&2; exit 2 ;;
esac
echo "<b>$2</b><br>Structure at $4"
"#;

    #[cfg(unix)]
    #[test]
    fn test_negative_x_coordinate_is_one_argument() {
        let query = FslAtlasQuery::new(
            ToolCommand::new("sh").with_leading_args(["-c", OPTION_STRICT_ATLASQ, "atlasq"]),
            DEFAULT_TIMEOUT,
        );

        let left = Peak {
            x: -42.0,
            y: -60.0,
            z: 48.0,
        };
        let stdout = query.query_coordinate("Juelich", &left).unwrap();
        assert_eq!(
            parse_coordinate_response(&stdout).into_label(),
            "Structure at -42, -60, 48"
        );

        let right = Peak {
            x: 12.0,
            y: 8.0,
            z: -6.0,
        };
        let stdout = query.query_coordinate("Juelich", &right).unwrap();
        assert_eq!(
            parse_coordinate_response(&stdout).into_label(),
            "Structure at 12, 8, -6"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_fsl_query_invalid_atlas() {
        let query = FslAtlasQuery::new(
            ToolCommand::new("sh").with_leading_args(["-c", "echo 'Invalid atlas name. Try one of:'"]),
            DEFAULT_TIMEOUT,
        );
        let err = query.query_overlap("Nope", Path::new("m.nii.gz")).unwrap_err();
        assert!(matches!(err, ClusterError::UnknownAtlas(name) if name == "Nope"));
    }
}
