//! Result containers: per-bundle prediction results and their registry-level
//! aggregate.
//!
//! A [`BundleResult`] owns an independent snapshot of the configuration that
//! produced it, so results stay interpretable after the bundle itself is
//! mutated or dropped. Rows can be referenced by index or, when data ids
//! were provided, by id.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ResultsError};
use crate::types::{EstimatorType, RecordBatch};
use crate::validation::BundleConfiguration;

// ============================================================================
// ROW REFERENCES
// ============================================================================

/// Reference to one row of a result: positional or by data id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRef {
    /// 0-based row index.
    Index(usize),
    /// Data id, resolvable only when the run supplied ids.
    Id(String),
}

impl From<usize> for RowRef {
    fn from(index: usize) -> Self {
        RowRef::Index(index)
    }
}

impl From<&str> for RowRef {
    fn from(id: &str) -> Self {
        RowRef::Id(id.to_string())
    }
}

// ============================================================================
// BUNDLE RESULT
// ============================================================================

/// Container for the results of a single bundle run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResult {
    id: String,
    configuration: BundleConfiguration,
    data: RecordBatch,
    data_ids: Option<Vec<String>>,
    remapped: Option<Vec<bool>>,
    predictions: RecordBatch,
}

impl BundleResult {
    /// Package one run's inputs and outputs.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        configuration: BundleConfiguration,
        data: RecordBatch,
        data_ids: Option<Vec<String>>,
        remapped: Option<Vec<bool>>,
        predictions: RecordBatch,
    ) -> Self {
        BundleResult {
            id: id.into(),
            configuration,
            data,
            data_ids,
            remapped,
            predictions,
        }
    }

    /// Result id; equals the producing bundle's id (possibly suffixed by the
    /// registry's two-pass mode).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Re-tag the result id. Used by the registry to disambiguate passes.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Snapshot of the configuration that produced this result.
    #[must_use]
    pub fn configuration(&self) -> &BundleConfiguration {
        &self.configuration
    }

    /// The data that was predicted on (after any remapping).
    #[must_use]
    pub fn data(&self) -> &RecordBatch {
        &self.data
    }

    /// Data ids, when the run supplied them.
    #[must_use]
    pub fn data_ids(&self) -> Option<&[String]> {
        self.data_ids.as_deref()
    }

    /// Raw prediction scores.
    #[must_use]
    pub fn predictions(&self) -> &RecordBatch {
        &self.predictions
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.rows()
    }

    /// Whether the result holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.rows() == 0
    }

    /// Whether remapping ran, and if so the per-row changed flags.
    #[must_use]
    pub fn is_remapped(&self) -> (bool, Option<&[bool]>) {
        match &self.remapped {
            Some(flags) => (true, Some(flags)),
            None => (false, None),
        }
    }

    fn resolve(&self, reference: &RowRef) -> Result<usize> {
        match reference {
            RowRef::Index(index) if *index < self.len() => Ok(*index),
            RowRef::Index(index) => {
                Err(ResultsError::UnknownReference(index.to_string()).into())
            }
            RowRef::Id(id) => {
                let ids = self
                    .data_ids
                    .as_ref()
                    .ok_or(ResultsError::NoDataIds)?;
                ids.iter()
                    .position(|candidate| candidate == id)
                    .ok_or_else(|| ResultsError::UnknownReference(id.clone()).into())
            }
        }
    }

    /// One data row, by index or id.
    pub fn data_row(&self, reference: impl Into<RowRef>) -> Result<&[f64]> {
        Ok(self.data.row(self.resolve(&reference.into())?))
    }

    /// One prediction row, by index or id.
    pub fn prediction_row(&self, reference: impl Into<RowRef>) -> Result<&[f64]> {
        Ok(self.predictions.row(self.resolve(&reference.into())?))
    }

    /// Predictions with the card's calibration table applied, when one
    /// applies (classifier, not pre-calibrated, calibrate enabled).
    /// Otherwise the raw predictions are returned unchanged.
    ///
    /// Calibration is a nearest-bin lookup, applied element-wise.
    #[must_use]
    pub fn calibrated_predictions(&self) -> RecordBatch {
        let Some((bins, values)) = self.configuration.calibration() else {
            return self.predictions.clone();
        };
        debug!(id = %self.id, "calibrating predictions through the card's lookup table");
        let mut calibrated = self.predictions.clone();
        for row in 0..calibrated.rows() {
            for col in 0..calibrated.width() {
                let score = self.predictions.get(row, col);
                let mut best = 0usize;
                let mut best_distance = f64::INFINITY;
                for (i, bin) in bins.iter().enumerate() {
                    let distance = (bin - score).abs();
                    if distance < best_distance {
                        best_distance = distance;
                        best = i;
                    }
                }
                calibrated.set(row, col, values[best]);
            }
        }
        calibrated
    }

    /// Class labels for each row, through the card's `classes` mapping.
    /// `None` for regressor bundles, whose output has no class reading.
    #[must_use]
    pub fn classifications(&self) -> Option<Vec<String>> {
        if self.configuration.estimator_type().ok()? != EstimatorType::Classifier {
            return None;
        }
        let classes = self.configuration.classes().ok()?;
        let predictions = self.calibrated_predictions();
        let mut labels = Vec::with_capacity(predictions.rows());
        for row in predictions.iter_rows() {
            let argmax = row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .map_or(0, |(i, _)| i);
            let index = u32::try_from(argmax).ok()?;
            labels.push(
                classes
                    .get(&index)
                    .cloned()
                    .unwrap_or_else(|| index.to_string()),
            );
        }
        Some(labels)
    }

    /// Multi-line overview of what the result contains.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "bundle result '{}'", self.id);
        let _ = writeln!(out, "  rows:        {}", self.len());
        let _ = writeln!(
            out,
            "  data:        {} x {}",
            self.data.rows(),
            self.data.width()
        );
        let _ = writeln!(
            out,
            "  predictions: {} x {}",
            self.predictions.rows(),
            self.predictions.width()
        );
        let _ = writeln!(out, "  data ids:    {}", self.data_ids.is_some());
        let _ = writeln!(out, "  remapped:    {}", self.remapped.is_some());
        out
    }
}

// ============================================================================
// REGISTRY RESULT
// ============================================================================

/// Aggregate of [`BundleResult`]s from one registry run.
///
/// Result ids are unique within the aggregate; inserting a duplicate fails
/// loudly rather than overwriting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryResult {
    results: Vec<BundleResult>,
}

impl RegistryResult {
    /// An empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result.
    ///
    /// # Errors
    ///
    /// `ResultsError::DuplicateResult` when a result with the same id is
    /// already stored; the aggregate is left unchanged.
    pub fn add(&mut self, result: BundleResult) -> Result<()> {
        if self.get(result.id()).is_some() {
            return Err(ResultsError::DuplicateResult(result.id().to_string()).into());
        }
        self.results.push(result);
        Ok(())
    }

    /// Number of stored results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the aggregate is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BundleResult> {
        self.results.iter().find(|r| r.id() == id)
    }

    /// Result at the given insertion position.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&BundleResult> {
        self.results.get(index)
    }

    /// All result ids, in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(BundleResult::id).collect()
    }

    /// Iterate over stored results.
    pub fn iter(&self) -> impl Iterator<Item = &BundleResult> {
        self.results.iter()
    }

    /// Render the aggregate as CSV: a header row with the data ids (or row
    /// indices), then one row per result output column.
    #[must_use]
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        if let Some(first) = self.results.first() {
            let header: Vec<String> = match first.data_ids() {
                Some(ids) => ids.to_vec(),
                None => (0..first.len()).map(|i| i.to_string()).collect(),
            };
            let _ = writeln!(out, "ids,{}", header.join(","));
        }
        for result in &self.results {
            let predictions = result.predictions();
            for col in 0..predictions.width() {
                let label = if predictions.width() > 1 {
                    format!("{}.{col}", result.id())
                } else {
                    result.id().to_string()
                };
                let values: Vec<String> = (0..predictions.rows())
                    .map(|row| predictions.get(row, col).to_string())
                    .collect();
                let _ = writeln!(out, "{label},{}", values.join(","));
            }
        }
        out
    }

    /// Multi-line overview of the aggregate.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "registry result: {} bundle result(s)", self.len());
        for result in &self.results {
            let _ = writeln!(out, "  - {} ({} rows)", result.id(), result.len());
        }
        out
    }
}

impl<'a> IntoIterator for &'a RegistryResult {
    type Item = &'a BundleResult;
    type IntoIter = std::slice::Iter<'a, BundleResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::document::{ConfigurationDocument, DocValue};

    use super::*;

    fn classifier_config(calibrate: bool) -> BundleConfiguration {
        let mut doc = ConfigurationDocument::new();
        doc.set("class", "json");
        doc.set("type", "classifier");
        doc.set("output", "classification");
        let mut classes = serde_yaml::Mapping::new();
        classes.insert(DocValue::from(0u64), DocValue::from("allowed"));
        classes.insert(DocValue::from(1u64), DocValue::from("excluded"));
        doc.set("classes", DocValue::Mapping(classes));
        doc.set(
            "parameters",
            DocValue::Sequence(vec![DocValue::Sequence(vec![
                DocValue::from("x"),
                DocValue::from("m"),
                DocValue::from(0.0),
                DocValue::from(1.0),
            ])]),
        );
        if calibrate {
            doc.set("classifier.calibrated", false);
            doc.set("classifier.calibrate", true);
            doc.set(
                "classifier.calibrate.bins",
                DocValue::Sequence(vec![DocValue::from(0.0), DocValue::from(1.0)]),
            );
            doc.set(
                "classifier.calibrate.values",
                DocValue::Sequence(vec![DocValue::from(0.25), DocValue::from(0.75)]),
            );
        }
        let mut config = BundleConfiguration::from_document(doc);
        config
            .validate_with(&crate::validation::ValidationOptions {
                verify_checksums: false,
            })
            .unwrap();
        config
    }

    fn sample_result(calibrate: bool) -> BundleResult {
        BundleResult::new(
            "toy",
            classifier_config(calibrate),
            RecordBatch::from_rows(vec![vec![0.1], vec![0.9]]).unwrap(),
            Some(vec!["a".into(), "b".into()]),
            None,
            RecordBatch::from_rows(vec![vec![0.8, 0.2], vec![0.1, 0.9]]).unwrap(),
        )
    }

    #[test]
    fn rows_resolve_by_index_and_id() {
        let result = sample_result(false);
        assert_eq!(result.data_row(1).unwrap(), &[0.9]);
        assert_eq!(result.prediction_row("a").unwrap(), &[0.8, 0.2]);
        let err = result.prediction_row("zz").unwrap_err();
        assert!(err.to_string().contains("zz"));
    }

    #[test]
    fn id_lookup_without_ids_is_an_error() {
        let mut result = sample_result(false);
        result.data_ids = None;
        let err = result.data_row("a").unwrap_err();
        assert!(err.to_string().contains("no data ids"));
    }

    #[test]
    fn classifications_take_the_argmax_through_the_classes_mapping() {
        let result = sample_result(false);
        assert_eq!(
            result.classifications().unwrap(),
            vec!["allowed".to_string(), "excluded".to_string()]
        );
    }

    #[test]
    fn calibration_is_a_nearest_bin_lookup() {
        let result = sample_result(true);
        let calibrated = result.calibrated_predictions();
        // 0.8 -> bin 1 -> 0.75; 0.2 -> bin 0 -> 0.25
        assert_eq!(calibrated.row(0), &[0.75, 0.25]);
        assert_eq!(calibrated.row(1), &[0.25, 0.75]);
    }

    #[test]
    fn uncalibrated_card_returns_raw_predictions() {
        let result = sample_result(false);
        assert_eq!(&result.calibrated_predictions(), result.predictions());
    }

    #[test]
    fn aggregate_rejects_duplicate_ids_without_partial_insert() {
        let mut aggregate = RegistryResult::new();
        aggregate.add(sample_result(false)).unwrap();
        let err = aggregate.add(sample_result(false)).unwrap_err();
        assert!(err.to_string().contains("toy"));
        assert_eq!(aggregate.len(), 1);
    }

    #[test]
    fn csv_rendering_has_ids_then_one_row_per_output_column() {
        let mut aggregate = RegistryResult::new();
        aggregate.add(sample_result(false)).unwrap();
        let csv = aggregate.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "ids,a,b");
        assert_eq!(lines[1], "toy.0,0.8,0.1");
        assert_eq!(lines[2], "toy.1,0.2,0.9");
    }
}
