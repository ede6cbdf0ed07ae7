//! Result matrix assembly
//!
//! The matrix is seeded from the cluster records and grows one label column
//! per atlas pass. Rows stay in record order for the whole lifetime of the
//! builder, so row `k` always describes the record at position `k`.

use crate::error::{ClusterError, Result};
use crate::table::{ClusterIndex, ClusterRecord, Peak};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Fixed leading columns of the rendered table
pub const BASE_COLUMNS: [&str; 5] = [
    "Cluster_Index",
    "Size",
    "Z-MAX X (mm)",
    "Z-MAX Y (mm)",
    "Z-MAX Z (mm)",
];

/// Header prefix for per-atlas label columns
pub const LABEL_COLUMN_PREFIX: &str = "Label_";

/// One label per cluster record, in record order
pub type LabelColumn = Vec<String>;

/// A finished matrix row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    pub index: ClusterIndex,
    pub size: f64,
    pub peak: Option<Peak>,
    pub labels: Vec<String>,
}

/// Accumulates label columns on top of the seeded cluster rows
#[derive(Debug, Clone)]
pub struct ResultMatrixBuilder {
    rows: Vec<MatrixRow>,
    atlases: Vec<String>,
}

impl ResultMatrixBuilder {
    /// Seed index/size/peak cells from the parsed records
    #[must_use]
    pub fn seed(records: &[ClusterRecord]) -> Self {
        let rows = records
            .iter()
            .map(|record| MatrixRow {
                index: record.index.clone(),
                size: record.size,
                peak: record.peak,
                labels: Vec::new(),
            })
            .collect();
        Self {
            rows,
            atlases: Vec::new(),
        }
    }

    /// Number of seeded rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append the label column produced for `atlas`
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::ColumnLengthMismatch` if `labels` does not have
    /// exactly one entry per row. The builder is left unchanged.
    pub fn append_label_column(&mut self, atlas: &str, labels: LabelColumn) -> Result<()> {
        if labels.len() != self.rows.len() {
            return Err(ClusterError::ColumnLengthMismatch {
                atlas: atlas.to_string(),
                expected: self.rows.len(),
                actual: labels.len(),
            });
        }
        for (row, label) in self.rows.iter_mut().zip(labels) {
            row.labels.push(label);
        }
        self.atlases.push(atlas.to_string());
        Ok(())
    }

    #[must_use]
    pub fn finalize(self) -> ResultMatrix {
        ResultMatrix {
            rows: self.rows,
            atlases: self.atlases,
        }
    }
}

/// Finalized matrix: `[index, size, x, y, z, label_atlas_1, ...]` per cluster
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultMatrix {
    rows: Vec<MatrixRow>,
    atlases: Vec<String>,
}

impl ResultMatrix {
    #[must_use]
    pub fn rows(&self) -> &[MatrixRow] {
        &self.rows
    }

    /// Row for the record at `position` in parse order
    #[must_use]
    pub fn row(&self, position: usize) -> Option<&MatrixRow> {
        self.rows.get(position)
    }

    #[must_use]
    pub fn size_at(&self, position: usize) -> Option<f64> {
        self.row(position).map(|row| row.size)
    }

    /// Atlases in column order
    #[must_use]
    pub fn atlases(&self) -> &[String] {
        &self.atlases
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, base columns first, then one `Label_<atlas>` per atlas
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        BASE_COLUMNS
            .iter()
            .map(|name| (*name).to_string())
            .chain(
                self.atlases
                    .iter()
                    .map(|atlas| format!("{LABEL_COLUMN_PREFIX}{atlas}")),
            )
            .collect()
    }

    /// Render as tab-delimited text with a header row
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Csv` if a record cannot be written.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_delimited(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the tab-delimited table to `path`
    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.write_delimited(BufWriter::new(file))
    }

    /// Write rows and atlas order as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    fn write_delimited<W: std::io::Write>(&self, out: W) -> Result<()> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(out);

        writer.write_record(self.header())?;
        for row in &self.rows {
            let mut cells = vec![row.index.text.clone(), row.size.to_string()];
            match row.peak {
                Some(peak) => {
                    cells.extend([peak.x.to_string(), peak.y.to_string(), peak.z.to_string()]);
                }
                None => cells.extend([String::new(), String::new(), String::new()]),
            }
            cells.extend(row.labels.iter().map(|label| sanitize_cell(label)));
            writer.write_record(&cells)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Labels come from free text; keep them on one line and inside one cell
fn sanitize_cell(label: &str) -> String {
    label
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}
