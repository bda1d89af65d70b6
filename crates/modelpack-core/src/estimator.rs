//! Estimator backends and the polymorphic estimator handle.
//!
//! A bundle stores its trained estimator as a serialized artifact in one of
//! two codecs, selected once by the validated `class` field: `json`
//! (a serde_json artifact, `estimator.json`) or `binary` (a bincode
//! artifact, `estimator.bin`). The handle owns at most one in-memory model
//! and moves between `Unloaded` and `Loaded` through [`EstimatorHandle::load`]
//! and [`EstimatorHandle::clear`]; releasing drops the only reference, making
//! the backing memory reclaimable immediately.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BundleError, Result};
use crate::types::RecordBatch;

/// Artifact file name for the JSON backend.
pub const ARTIFACT_JSON: &str = "estimator.json";
/// Artifact file name for the binary backend.
pub const ARTIFACT_BINARY: &str = "estimator.bin";

// ============================================================================
// BACKEND KIND
// ============================================================================

/// Closed set of estimator artifact codecs.
///
/// Decided exactly once from the validated `class` field; unvalidated values
/// cannot reach the handle factory because the validation pipeline treats an
/// unknown class as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// serde_json artifact; exposes confidence scores.
    Json,
    /// bincode artifact; has no notion of confidence.
    Binary,
}

impl BackendKind {
    /// Parse the configuration-card spelling.
    #[must_use]
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "json" => Some(Self::Json),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }

    /// Configuration-card spelling.
    #[must_use]
    pub const fn class_name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }

    /// Artifact file name inside a bundle folder.
    #[must_use]
    pub const fn artifact_file(self) -> &'static str {
        match self {
            Self::Json => ARTIFACT_JSON,
            Self::Binary => ARTIFACT_BINARY,
        }
    }
}

// ============================================================================
// MODEL
// ============================================================================

/// The serialized estimator: a linear map from inputs to outputs.
///
/// Regressors carry a single output row; classifiers one row per class, in
/// class-index order. The runtime treats this as an opaque predict
/// capability — training is entirely out of scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Expected record width.
    pub inputs: usize,
    /// One weight row per output.
    pub weights: Vec<Vec<f64>>,
    /// One intercept per output.
    pub intercepts: Vec<f64>,
}

impl LinearModel {
    /// Number of outputs per record.
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.weights.len()
    }

    fn score(&self, record: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.intercepts)
            .map(|(row, b)| record.iter().zip(row).map(|(x, w)| x * w).sum::<f64>() + b)
            .collect()
    }
}

// ============================================================================
// HANDLE
// ============================================================================

/// Uniform load/predict/clear wrapper around a concrete estimator backend.
#[derive(Debug)]
pub struct EstimatorHandle {
    kind: BackendKind,
    folder: PathBuf,
    model: Option<LinearModel>,
}

impl EstimatorHandle {
    /// Create an unloaded handle for the artifact in `folder`.
    #[must_use]
    pub fn new(kind: BackendKind, folder: impl Into<PathBuf>) -> Self {
        EstimatorHandle {
            kind,
            folder: folder.into(),
            model: None,
        }
    }

    /// The backend codec this handle wraps.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Full path of the estimator artifact.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.folder.join(self.kind.artifact_file())
    }

    /// Whether a model is resident in memory.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Read the artifact from disk and materialize the model.
    ///
    /// # Errors
    ///
    /// `BundleError::ArtifactMissing` when the artifact file is absent,
    /// `BundleError::ArtifactDecode` when it cannot be decoded.
    pub fn load(&mut self) -> Result<()> {
        let path = self.artifact_path();
        if !path.is_file() {
            return Err(BundleError::ArtifactMissing(path).into());
        }
        let bytes = std::fs::read(&path).map_err(|source| BundleError::Io {
            path: path.clone(),
            source,
        })?;
        let model = match self.kind {
            BackendKind::Json => {
                serde_json::from_slice(&bytes).map_err(|e| BundleError::ArtifactDecode {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            BackendKind::Binary => {
                bincode::deserialize(&bytes).map_err(|e| BundleError::ArtifactDecode {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
        };
        debug!(artifact = %path.display(), "estimator loaded");
        self.model = Some(model);
        Ok(())
    }

    /// Drop the in-memory model. The handle can be reloaded later.
    pub fn clear(&mut self) {
        if self.model.take().is_some() {
            debug!(artifact = %self.artifact_path().display(), "estimator cleared");
        }
    }

    /// Predict raw output scores for a batch of records.
    ///
    /// # Errors
    ///
    /// `BundleError::EstimatorNotLoaded` in the unloaded state,
    /// `BundleError::ShapeMismatch` when the record width does not match the
    /// model's input width.
    pub fn predict(&self, data: &RecordBatch) -> Result<RecordBatch> {
        let model = self
            .model
            .as_ref()
            .ok_or(BundleError::EstimatorNotLoaded)?;
        if data.width() != model.inputs {
            return Err(BundleError::ShapeMismatch {
                expected: model.inputs,
                actual: data.width(),
            }
            .into());
        }
        let mut values = Vec::with_capacity(data.rows() * model.outputs());
        for record in data.iter_rows() {
            values.extend(model.score(record));
        }
        RecordBatch::from_flat(values, model.outputs())
    }

    /// Predict normalized confidence scores, when the backend supports the
    /// notion. The binary backend returns `Ok(None)` rather than failing.
    pub fn predict_with_confidence(&self, data: &RecordBatch) -> Result<Option<RecordBatch>> {
        if self.kind == BackendKind::Binary {
            debug!("binary backend has no confidence scores");
            return Ok(None);
        }
        let raw = self.predict(data)?;
        let mut values = Vec::with_capacity(raw.rows() * raw.width());
        for row in raw.iter_rows() {
            // Softmax per record; the max shift keeps exponents bounded.
            let peak = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let exps: Vec<f64> = row.iter().map(|v| (v - peak).exp()).collect();
            let total: f64 = exps.iter().sum();
            values.extend(exps.iter().map(|e| e / total));
        }
        Ok(Some(RecordBatch::from_flat(values, raw.width())?))
    }

    /// Serialize `model` into `folder` with this handle's codec.
    pub fn write_artifact(
        kind: BackendKind,
        folder: impl AsRef<Path>,
        model: &LinearModel,
    ) -> Result<PathBuf> {
        let path = folder.as_ref().join(kind.artifact_file());
        let bytes = match kind {
            BackendKind::Json => {
                serde_json::to_vec_pretty(model).map_err(|e| BundleError::ArtifactDecode {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            BackendKind::Binary => {
                bincode::serialize(model).map_err(|e| BundleError::ArtifactDecode {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
        };
        std::fs::write(&path, bytes).map_err(|source| BundleError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn toy_model() -> LinearModel {
        LinearModel {
            inputs: 2,
            weights: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            intercepts: vec![0.0, 1.0],
        }
    }

    #[test]
    fn predict_requires_loaded_state() {
        let handle = EstimatorHandle::new(BackendKind::Json, "/tmp/none");
        let err = handle
            .predict(&RecordBatch::single(vec![1.0, 2.0]))
            .unwrap_err();
        assert!(err.to_string().contains("not loaded"));
    }

    #[test]
    fn load_predict_clear_lifecycle() {
        let dir = TempDir::new().unwrap();
        EstimatorHandle::write_artifact(BackendKind::Json, dir.path(), &toy_model()).unwrap();

        let mut handle = EstimatorHandle::new(BackendKind::Json, dir.path());
        assert!(!handle.is_loaded());
        handle.load().unwrap();
        assert!(handle.is_loaded());

        let preds = handle
            .predict(&RecordBatch::single(vec![3.0, 4.0]))
            .unwrap();
        assert_eq!(preds.row(0), &[3.0, 5.0]);

        handle.clear();
        assert!(!handle.is_loaded());
    }

    #[test]
    fn binary_artifact_round_trips() {
        let dir = TempDir::new().unwrap();
        EstimatorHandle::write_artifact(BackendKind::Binary, dir.path(), &toy_model()).unwrap();
        let mut handle = EstimatorHandle::new(BackendKind::Binary, dir.path());
        handle.load().unwrap();
        let preds = handle
            .predict(&RecordBatch::single(vec![1.0, 1.0]))
            .unwrap();
        assert_eq!(preds.row(0), &[1.0, 2.0]);
    }

    #[test]
    fn confidence_is_json_only_and_normalized() {
        let dir = TempDir::new().unwrap();
        EstimatorHandle::write_artifact(BackendKind::Json, dir.path(), &toy_model()).unwrap();
        let mut handle = EstimatorHandle::new(BackendKind::Json, dir.path());
        handle.load().unwrap();

        let conf = handle
            .predict_with_confidence(&RecordBatch::single(vec![2.0, 0.0]))
            .unwrap()
            .unwrap();
        let total: f64 = conf.row(0).iter().sum();
        assert!((total - 1.0).abs() < 1e-12);

        let mut binary = EstimatorHandle::new(BackendKind::Binary, dir.path());
        EstimatorHandle::write_artifact(BackendKind::Binary, dir.path(), &toy_model()).unwrap();
        binary.load().unwrap();
        assert!(binary
            .predict_with_confidence(&RecordBatch::single(vec![2.0, 0.0]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_artifact_is_reported_with_its_path() {
        let dir = TempDir::new().unwrap();
        let mut handle = EstimatorHandle::new(BackendKind::Binary, dir.path());
        let err = handle.load().unwrap_err();
        assert!(err.to_string().contains(ARTIFACT_BINARY));
    }

    #[test]
    fn width_mismatch_is_rejected_before_scoring() {
        let dir = TempDir::new().unwrap();
        EstimatorHandle::write_artifact(BackendKind::Json, dir.path(), &toy_model()).unwrap();
        let mut handle = EstimatorHandle::new(BackendKind::Json, dir.path());
        handle.load().unwrap();
        let err = handle
            .predict(&RecordBatch::single(vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert!(err.to_string().contains('2') && err.to_string().contains('3'));
    }
}
