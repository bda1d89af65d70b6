//! Bundle hook functions.
//!
//! A bundle may ship a `functions.yaml` file declaring optional, externally
//! supplied capabilities: a file-reading hook, a data-remapping hook, and a
//! pair of pre/post prediction transforms. Each hook declares its `arity`;
//! the validation pipeline disables any feature whose hook is absent or does
//! not take exactly one argument.
//!
//! Example hooks file:
//!
//! ```yaml
//! read:
//!   arity: 1
//!   columns:
//!     - [MASS, m0]
//!     - [MASS, m12]
//! map:
//!   arity: 1
//!   lower: [0.0, 100.0]
//!   upper: [2000.0, 4000.0]
//! transform:
//!   arity: 1
//!   scale: 0.001
//! transform_predictions:
//!   arity: 1
//!   offset: -1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BundleError, Result};
use crate::tabular::RecordSelector;
use crate::types::RecordBatch;

/// File name of the hooks file inside a bundle folder.
pub const HOOKS_FILE: &str = "functions.yaml";

fn default_arity() -> u32 {
    1
}

/// File-reading hook: which `(section, key)` entries form one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadHook {
    /// Declared argument count; must be 1 to be usable.
    #[serde(default = "default_arity")]
    pub arity: u32,
    /// Extraction targets, one per record column.
    #[serde(default)]
    pub columns: Vec<(String, String)>,
}

impl ReadHook {
    /// Extraction targets as selectors.
    #[must_use]
    pub fn selectors(&self) -> Vec<RecordSelector> {
        self.columns
            .iter()
            .map(|(section, key)| RecordSelector::new(section.clone(), key.clone()))
            .collect()
    }
}

/// Data-remapping hook: explicit per-column clamp bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapHook {
    /// Declared argument count; must be 1 to be usable.
    #[serde(default = "default_arity")]
    pub arity: u32,
    /// Per-column lower clamp bounds.
    #[serde(default)]
    pub lower: Vec<f64>,
    /// Per-column upper clamp bounds.
    #[serde(default)]
    pub upper: Vec<f64>,
}

impl MapHook {
    /// Clamp every column of `batch` into the hook's bounds.
    ///
    /// Columns beyond the declared bound lists pass through unchanged.
    /// Returns the remapped batch and a per-row changed flag.
    #[must_use]
    pub fn apply(&self, batch: &RecordBatch) -> (RecordBatch, Vec<bool>) {
        let mut mapped = batch.clone();
        let mut changed = vec![false; batch.rows()];
        for row in 0..batch.rows() {
            for col in 0..batch.width() {
                let value = batch.get(row, col);
                let mut new = value;
                if let Some(lo) = self.lower.get(col) {
                    new = new.max(*lo);
                }
                if let Some(hi) = self.upper.get(col) {
                    new = new.min(*hi);
                }
                if new != value {
                    mapped.set(row, col, new);
                    changed[row] = true;
                }
            }
        }
        (mapped, changed)
    }
}

/// Element-wise affine transform applied to data or predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineHook {
    /// Declared argument count; must be 1 to be usable.
    #[serde(default = "default_arity")]
    pub arity: u32,
    /// Multiplicative factor.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Additive offset.
    #[serde(default)]
    pub offset: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl AffineHook {
    /// Apply `x * scale + offset` element-wise.
    #[must_use]
    pub fn apply(&self, batch: &RecordBatch) -> RecordBatch {
        let mut out = batch.clone();
        for row in 0..batch.rows() {
            for col in 0..batch.width() {
                out.set(row, col, batch.get(row, col) * self.scale + self.offset);
            }
        }
        out
    }
}

/// The full set of hooks declared by a bundle, all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookSet {
    /// File-reading hook (`filereader: function`).
    #[serde(default)]
    pub read: Option<ReadHook>,
    /// Data-remapping hook (`mapping: function`).
    #[serde(default)]
    pub map: Option<MapHook>,
    /// Pre-prediction data transform; absent means identity.
    #[serde(default)]
    pub transform: Option<AffineHook>,
    /// Post-prediction transform; absent means identity.
    #[serde(default)]
    pub transform_predictions: Option<AffineHook>,
}

impl HookSet {
    /// Load the hooks file from a bundle folder.
    ///
    /// Returns `Ok(None)` when the bundle ships no hooks file — that is the
    /// common case, not an error.
    pub fn load(folder: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = folder.as_ref().join(HOOKS_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|source| BundleError::Io {
            path: path.clone(),
            source,
        })?;
        let hooks: HookSet = serde_yaml::from_str(&text).map_err(|e| BundleError::ArtifactDecode {
            path,
            reason: e.to_string(),
        })?;
        debug!(
            read = hooks.read.is_some(),
            map = hooks.map.is_some(),
            transform = hooks.transform.is_some(),
            "loaded bundle hooks"
        );
        Ok(Some(hooks))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn absent_hooks_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(HookSet::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn parses_all_hooks_with_default_arity() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(HOOKS_FILE),
            "read:\n  columns:\n    - [MASS, m0]\nmap:\n  lower: [0.0]\n  upper: [1.0]\ntransform:\n  scale: 2.0\n",
        )
        .unwrap();
        let hooks = HookSet::load(dir.path()).unwrap().unwrap();
        assert_eq!(hooks.read.as_ref().unwrap().arity, 1);
        assert_eq!(hooks.read.unwrap().selectors().len(), 1);
        assert!(hooks.transform_predictions.is_none());
    }

    #[test]
    fn map_hook_clamps_and_flags_changed_rows() {
        let hook = MapHook {
            arity: 1,
            lower: vec![0.0, 0.0],
            upper: vec![1.0, 10.0],
        };
        let batch = RecordBatch::from_rows(vec![vec![0.5, 5.0], vec![2.0, -3.0]]).unwrap();
        let (mapped, changed) = hook.apply(&batch);
        assert_eq!(mapped.row(0), &[0.5, 5.0]);
        assert_eq!(mapped.row(1), &[1.0, 0.0]);
        assert_eq!(changed, vec![false, true]);
    }

    #[test]
    fn affine_hook_is_elementwise() {
        let hook = AffineHook {
            arity: 1,
            scale: 2.0,
            offset: 1.0,
        };
        let batch = RecordBatch::single(vec![1.0, -1.0]);
        assert_eq!(hook.apply(&batch).row(0), &[3.0, -1.0]);
    }
}
