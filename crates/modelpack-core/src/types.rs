//! Shared domain types: record batches, parameter specifications, estimator
//! classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

// ============================================================================
// ESTIMATOR TYPE
// ============================================================================

/// What kind of output the wrapped estimator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorType {
    /// Discrete class scores, interpretable through the `classes` mapping.
    Classifier,
    /// Continuous values.
    Regressor,
}

impl EstimatorType {
    /// Parse the configuration-card spelling.
    #[must_use]
    pub fn from_card(value: &str) -> Option<Self> {
        match value {
            "classifier" => Some(Self::Classifier),
            "regressor" => Some(Self::Regressor),
            _ => None,
        }
    }

    /// Configuration-card spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Regressor => "regressor",
        }
    }
}

impl fmt::Display for EstimatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PARAMETER SPECIFICATION
// ============================================================================

/// One input parameter: name, unit, and the range sampled at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name.
    pub name: String,
    /// Physical unit, free-form.
    pub unit: String,
    /// Lower edge of the trained region.
    pub min: f64,
    /// Upper edge of the trained region. Invariant: `min <= max`.
    pub max: f64,
}

impl ParameterSpec {
    /// Width of the trained region.
    #[must_use]
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

// ============================================================================
// RECORD BATCH
// ============================================================================

/// A dense 2-D array of records, row major.
///
/// Every row has the same width; the constructors enforce it. Used both for
/// input data (rows × parameters) and for predictions (rows × outputs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    width: usize,
    values: Vec<f64>,
}

impl RecordBatch {
    /// Build from explicit rows.
    ///
    /// # Errors
    ///
    /// `BundleError::RaggedRecords` if rows differ in width. An empty row
    /// set yields an empty batch of width 0.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let width = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * width);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(BundleError::RaggedRecords {
                    index,
                    expected: width,
                    actual: row.len(),
                }
                .into());
            }
            values.extend_from_slice(row);
        }
        Ok(RecordBatch { width, values })
    }

    /// Build from a single record.
    #[must_use]
    pub fn single(row: Vec<f64>) -> Self {
        RecordBatch {
            width: row.len(),
            values: row,
        }
    }

    /// Build from a flat row-major buffer.
    ///
    /// # Panics
    ///
    /// Never panics; a buffer whose length is not a multiple of `width` is
    /// rejected as ragged.
    pub fn from_flat(values: Vec<f64>, width: usize) -> Result<Self> {
        if width == 0 && !values.is_empty() || width != 0 && values.len() % width != 0 {
            return Err(BundleError::RaggedRecords {
                index: if width == 0 { 0 } else { values.len() / width },
                expected: width,
                actual: if width == 0 { values.len() } else { values.len() % width },
            }
            .into());
        }
        Ok(RecordBatch { width, values })
    }

    /// Number of records.
    #[must_use]
    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    /// Record width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the batch holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Record `index` as a slice.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        &self.values[index * self.width..(index + 1) * self.width]
    }

    /// Iterate over records.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks_exact(self.width.max(1))
    }

    /// Value at `(row, col)`.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width + col]
    }

    /// Overwrite the value at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row * self.width + col] = value;
    }

    /// The flat row-major buffer.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Copy out explicit rows.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.iter_rows().map(<[f64]>::to_vec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = RecordBatch::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn batch_geometry() {
        let batch = RecordBatch::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(batch.rows(), 2);
        assert_eq!(batch.width(), 2);
        assert_eq!(batch.row(1), &[3.0, 4.0]);
        assert_eq!(batch.get(0, 1), 2.0);
    }

    #[test]
    fn single_record_is_one_row() {
        let batch = RecordBatch::single(vec![5.0, 6.0, 7.0]);
        assert_eq!(batch.rows(), 1);
        assert_eq!(batch.width(), 3);
    }

    #[test]
    fn from_flat_checks_divisibility() {
        assert!(RecordBatch::from_flat(vec![1.0, 2.0, 3.0], 2).is_err());
        let ok = RecordBatch::from_flat(vec![1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(ok.rows(), 2);
    }

    #[test]
    fn estimator_type_card_spellings() {
        assert_eq!(
            EstimatorType::from_card("classifier"),
            Some(EstimatorType::Classifier)
        );
        assert_eq!(
            EstimatorType::from_card("regressor"),
            Some(EstimatorType::Regressor)
        );
        assert_eq!(EstimatorType::from_card("cluster"), None);
    }
}
