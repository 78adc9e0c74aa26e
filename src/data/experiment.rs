//! Experimental reflectivity data.
//!
//! Text files hold 3 columns (q, R, dR) or 4 columns (q, R, dR, dq),
//! whitespace separated. Lines starting with `#` are comments.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EditorError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentData {
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub ye: Vec<f64>,
    /// Resolution column; absent for 3-column data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xe: Option<Vec<f64>>,
    /// SHA-256 of the file the data was read from.
    #[serde(default)]
    pub hash_sha256: String,
}

impl ExperimentData {
    /// Build from columns, checking that every column has the length of `x`.
    pub fn from_columns(
        name: impl Into<String>,
        x: Vec<f64>,
        y: Vec<f64>,
        ye: Vec<f64>,
        xe: Option<Vec<f64>>,
    ) -> Result<Self> {
        let expected = x.len();
        check_len("y", expected, y.len())?;
        check_len("ye", expected, ye.len())?;
        if let Some(xe) = &xe {
            check_len("xe", expected, xe.len())?;
        }
        Ok(Self {
            name: name.into(),
            x,
            y,
            ye,
            xe,
            hash_sha256: String::new(),
        })
    }

    /// Rebuild from the row-per-column layout used in project files.
    ///
    /// The fourth column is taken from the actual arity of `columns`.
    pub fn from_column_arrays(name: impl Into<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        let arity = columns.len();
        let mut columns = columns.into_iter();
        match arity {
            3 | 4 => {
                let x = columns.next().unwrap_or_default();
                let y = columns.next().unwrap_or_default();
                let ye = columns.next().unwrap_or_default();
                let xe = columns.next();
                Self::from_columns(name, x, y, ye, xe)
            }
            count => Err(EditorError::BadColumnCount { count }),
        }
    }

    pub fn to_column_arrays(&self) -> Vec<Vec<f64>> {
        let mut columns = vec![self.x.clone(), self.y.clone(), self.ye.clone()];
        if let Some(xe) = &self.xe {
            columns.push(xe.clone());
        }
        columns
    }

    /// Parse a whitespace-separated data file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EditorError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let bytes = fs::read(path).map_err(|e| EditorError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8_lossy(&bytes);
        let malformed = |reason: String| EditorError::MalformedData {
            path: path.to_path_buf(),
            reason,
        };

        let mut rows: Vec<Vec<f64>> = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row = line
                .split_whitespace()
                .map(|field| field.parse::<f64>())
                .collect::<std::result::Result<Vec<f64>, _>>()
                .map_err(|e| malformed(format!("line {}: {}", line_no + 1, e)))?;
            rows.push(row);
        }

        let width = rows.first().map(Vec::len).ok_or(EditorError::EmptyData)?;
        if width != 3 && width != 4 {
            return Err(malformed(format!("{} columns, expected 3 or 4", width)));
        }
        if let Some(bad) = rows.iter().position(|row| row.len() != width) {
            return Err(malformed(format!(
                "row {} has {} columns, expected {}",
                bad + 1,
                rows[bad].len(),
                width
            )));
        }

        let column = |i: usize| rows.iter().map(|row| row[i]).collect::<Vec<f64>>();
        let xe = (width == 4).then(|| column(3));
        let name = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let mut data = Self::from_columns(name, column(0), column(1), column(2), xe)?;
        data.hash_sha256 = format!("{:x}", Sha256::digest(&bytes));

        info!(
            "Loaded {} points from {} ({} columns)",
            data.len(),
            path.display(),
            width
        );
        Ok(data)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn column_count(&self) -> usize {
        if self.xe.is_some() {
            4
        } else {
            3
        }
    }

    /// Fit weights, `1 / ye`.
    ///
    /// Fails on empty data and on any zero or non-finite uncertainty, so no
    /// infinite weight ever reaches a minimizer.
    pub fn weights(&self) -> Result<Vec<f64>> {
        if self.is_empty() {
            return Err(EditorError::EmptyData);
        }
        check_len("y", self.x.len(), self.y.len())?;
        check_len("ye", self.x.len(), self.ye.len())?;

        let weights = self
            .ye
            .iter()
            .enumerate()
            .map(|(index, &value)| {
                if value == 0.0 || !value.is_finite() {
                    Err(EditorError::InvalidUncertainty { index, value })
                } else {
                    Ok(1.0 / value)
                }
            })
            .collect::<Result<Vec<f64>>>()?;
        debug!("Computed {} fit weights", weights.len());
        Ok(weights)
    }

    /// Inclusive x range, if any points exist.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        let min = self.x.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (!self.is_empty()).then_some((min, max))
    }
}

fn check_len(column: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(EditorError::LengthMismatch {
            column,
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_three_columns() {
        let file = write_file("# q R dR\n0.01 1.0 0.1\n0.02 0.5 0.05\n");
        let data = ExperimentData::load_from_file(file.path()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.column_count(), 3);
        assert!(data.xe.is_none());
        assert_eq!(data.hash_sha256.len(), 64);
    }

    #[test]
    fn test_load_four_columns() {
        let file = write_file("0.01 1.0 0.1 0.001\n0.02 0.5 0.05 0.002\n");
        let data = ExperimentData::load_from_file(file.path()).unwrap();
        assert_eq!(data.column_count(), 4);
        assert_eq!(data.xe, Some(vec![0.001, 0.002]));
    }

    #[test]
    fn test_load_rejects_two_columns() {
        let file = write_file("0.01 1.0\n");
        assert!(matches!(
            ExperimentData::load_from_file(file.path()),
            Err(EditorError::MalformedData { .. })
        ));
    }

    #[test]
    fn test_load_rejects_ragged_rows() {
        let file = write_file("0.01 1.0 0.1\n0.02 0.5\n");
        assert!(ExperimentData::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_zero_uncertainty_rejected() {
        let data = ExperimentData::from_columns(
            "d",
            vec![0.0, 1.0, 2.0],
            vec![10.0, 8.0, 6.0],
            vec![1.0, 0.0, 1.0],
            None,
        )
        .unwrap();
        assert!(matches!(
            data.weights(),
            Err(EditorError::InvalidUncertainty { index: 1, .. })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let result = ExperimentData::from_columns("d", vec![0.0, 1.0], vec![1.0], vec![1.0, 1.0], None);
        assert!(matches!(
            result,
            Err(EditorError::LengthMismatch { column: "y", .. })
        ));
    }

    #[test]
    fn test_column_arrays_follow_arity() {
        let three = vec![vec![1.0], vec![2.0], vec![0.5]];
        let data = ExperimentData::from_column_arrays("d", three.clone()).unwrap();
        assert!(data.xe.is_none());
        assert_eq!(data.to_column_arrays(), three);

        let four = vec![vec![1.0], vec![2.0], vec![0.5], vec![0.01]];
        let data = ExperimentData::from_column_arrays("d", four.clone()).unwrap();
        assert_eq!(data.to_column_arrays(), four);
    }

    #[test]
    fn test_column_arrays_wrong_arity_is_data_error() {
        let two = vec![vec![1.0], vec![2.0]];
        let err = ExperimentData::from_column_arrays("d", two).unwrap_err();
        assert!(matches!(err, EditorError::BadColumnCount { count: 2 }));
        assert_eq!(err.category(), crate::error::ErrorCategory::Data);
        assert!(err.recovery_suggestion().is_some());
    }
}
