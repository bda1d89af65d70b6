//! A bundle: one trained estimator plus its validated configuration,
//! integrity manifest, and optional hooks, loaded from a self-contained
//! folder.
//!
//! Folder layout:
//!
//! ```text
//! <bundle>/
//!   configuration.yaml   # dotted-key configuration card
//!   estimator.json       # or estimator.bin; selects the backend codec
//!   functions.yaml       # optional hooks (read / map / transforms)
//!   checksums.sfv        # stored integrity manifest
//!   data/*.json          # optional persisted record batches
//! ```
//!
//! The estimator handle sits behind a per-bundle mutex; [`Bundle::run`]
//! holds it from the cold/warm check through prediction and the one-shot
//! release, so the load-predict-release sequence of the dynamic memory
//! policy is atomic with respect to concurrent callers.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{BundleError, Result};
use crate::estimator::EstimatorHandle;
use crate::hooks::HookSet;
use crate::results::BundleResult;
use crate::tabular::read_record_file;
use crate::types::RecordBatch;
use crate::validation::{BundleConfiguration, FileReaderMode, MappingMode};

/// File name of the configuration card inside a bundle folder.
pub const CONFIGURATION_FILE: &str = "configuration.yaml";

// ============================================================================
// RUN INPUT
// ============================================================================

/// Input accepted by [`Bundle::run`]: in-memory records, or paths to record
/// files dispatched through the bundle's configured file reader.
#[derive(Debug, Clone)]
pub enum RunInput {
    /// Records already in memory.
    Records(RecordBatch),
    /// Record files to read.
    Paths(Vec<PathBuf>),
}

impl From<RecordBatch> for RunInput {
    fn from(batch: RecordBatch) -> Self {
        RunInput::Records(batch)
    }
}

impl From<Vec<f64>> for RunInput {
    fn from(row: Vec<f64>) -> Self {
        RunInput::Records(RecordBatch::single(row))
    }
}

impl From<PathBuf> for RunInput {
    fn from(path: PathBuf) -> Self {
        RunInput::Paths(vec![path])
    }
}

impl From<&Path> for RunInput {
    fn from(path: &Path) -> Self {
        RunInput::Paths(vec![path.to_path_buf()])
    }
}

impl From<Vec<PathBuf>> for RunInput {
    fn from(paths: Vec<PathBuf>) -> Self {
        RunInput::Paths(paths)
    }
}

// ============================================================================
// BUNDLE
// ============================================================================

/// One loaded bundle: id, folder, validated configuration, hooks, and the
/// estimator handle.
#[derive(Debug)]
pub struct Bundle {
    id: String,
    folder: PathBuf,
    configuration: BundleConfiguration,
    hooks: Option<HookSet>,
    estimator: Mutex<EstimatorHandle>,
}

impl Bundle {
    /// Load a bundle from `folder`.
    ///
    /// Loads and validates the configuration card (integrity manifest
    /// included), constructs the estimator handle for the validated backend
    /// codec, and — when `load_estimator` is set — materializes the
    /// estimator immediately. With `load_estimator` off the estimator is
    /// loaded on demand by [`Bundle::run`].
    ///
    /// The bundle id falls back to the card's `default_id` when `id` is
    /// `None`.
    pub fn load(
        folder: impl AsRef<Path>,
        id: Option<String>,
        load_estimator: bool,
    ) -> Result<Self> {
        // Strip a trailing separator so folder-derived paths stay canonical.
        let folder = PathBuf::from(
            folder
                .as_ref()
                .to_string_lossy()
                .trim_end_matches(std::path::MAIN_SEPARATOR)
                .to_string(),
        );
        if !folder.exists() {
            return Err(BundleError::FolderNotFound(folder).into());
        }

        let mut configuration = BundleConfiguration::load(folder.join(CONFIGURATION_FILE))?;
        configuration.validate()?;

        let kind = configuration.backend_kind()?;
        let hooks = HookSet::load(&folder)?;
        let mut handle = EstimatorHandle::new(kind, &folder);
        if load_estimator {
            handle.load()?;
        }

        let id = match id {
            Some(id) => id,
            None => configuration.default_id()?,
        };
        info!(id = %id, folder = %folder.display(), "bundle loaded");
        Ok(Bundle {
            id,
            folder,
            configuration,
            hooks,
            estimator: Mutex::new(handle),
        })
    }

    /// Bundle id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Bundle folder.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// The validated configuration.
    #[must_use]
    pub fn configuration(&self) -> &BundleConfiguration {
        &self.configuration
    }

    /// Whether the estimator is currently resident in memory.
    #[must_use]
    pub fn is_estimator_loaded(&self) -> bool {
        self.estimator.lock().is_loaded()
    }

    /// Materialize the estimator if it is not already resident.
    pub fn load_estimator(&self) -> Result<()> {
        let mut handle = self.estimator.lock();
        if !handle.is_loaded() {
            handle.load()?;
        }
        Ok(())
    }

    /// Drop the estimator from memory.
    pub fn release_estimator(&self) {
        self.estimator.lock().clear();
    }

    /// Whether the bundle can run, attempting to self-heal once: an
    /// unvalidated configuration is re-validated and an unloaded estimator
    /// is loaded before answering.
    pub fn can_run(&mut self) -> bool {
        if !self.configuration.is_validated() {
            if let Err(e) = self.configuration.validate() {
                warn!(id = %self.id, error = %e, "re-validation failed");
                return false;
            }
        }
        if let Err(e) = self.load_estimator() {
            warn!(id = %self.id, error = %e, "estimator load failed");
            return false;
        }
        self.configuration.is_validated() && self.is_estimator_loaded()
    }

    /// Read record files through the bundle's configured file reader.
    ///
    /// # Errors
    ///
    /// `BundleError::NoFileReader` when the card disables file reading;
    /// reader errors propagate per file.
    pub fn read_records(&self, paths: &[PathBuf]) -> Result<RecordBatch> {
        let selectors = match self.configuration.filereader() {
            FileReaderMode::Disabled => {
                return Err(BundleError::NoFileReader(self.id.clone()).into());
            }
            FileReaderMode::Hook => {
                let read = self
                    .hooks
                    .as_ref()
                    .and_then(|h| h.read.as_ref())
                    .ok_or_else(|| BundleError::NoFileReader(self.id.clone()))?;
                read.selectors()
            }
            FileReaderMode::Selectors(selectors) => selectors,
        };

        debug!(id = %self.id, files = paths.len(), "reading record file(s)");
        if let Some(formats) = self.configuration.filereader_formats() {
            let stray = paths.iter().any(|path| {
                !formats
                    .iter()
                    .any(|ext| path.to_string_lossy().ends_with(ext))
            });
            if stray {
                warn!(
                    id = %self.id,
                    formats = ?formats,
                    "one or more files do not have an accepted extension; \
                     this might yield errors later on"
                );
            }
        }

        let mut rows = Vec::with_capacity(paths.len());
        for path in paths {
            rows.push(read_record_file(path, &selectors)?);
        }
        RecordBatch::from_rows(rows)
    }

    /// Remap records into the trained region per the card's mapping mode.
    ///
    /// Returns the (possibly remapped) records and, when remapping ran,
    /// per-row flags telling which records were changed. With mapping
    /// disabled the input is returned unaltered and the flags are `None`.
    pub fn map_records(&self, batch: &RecordBatch) -> Result<(RecordBatch, Option<Vec<bool>>)> {
        match self.configuration.mapping() {
            MappingMode::Disabled => {
                debug!(id = %self.id, "mapping is not enabled, returning data unaltered");
                Ok((batch.clone(), None))
            }
            MappingMode::Hook => match self.hooks.as_ref().and_then(|h| h.map.as_ref()) {
                Some(hook) => {
                    debug!(id = %self.id, "remapping data through the map hook");
                    let (mapped, flags) = hook.apply(batch);
                    Ok((mapped, Some(flags)))
                }
                None => {
                    // Validation disables hook mapping when the hook is
                    // absent; a vanished hooks file degrades the same way.
                    warn!(id = %self.id, "map hook is gone; skipping remap");
                    Ok((batch.clone(), None))
                }
            },
            MappingMode::Margin(margin) => {
                debug!(id = %self.id, margin, "remapping data into the trained region");
                let parameters = self.configuration.parameters()?;
                let mut mapped = batch.clone();
                let mut flags = vec![false; batch.rows()];
                for (col, spec) in parameters.iter().enumerate().take(batch.width()) {
                    let lo = spec.min + margin * margin;
                    let hi = spec.max - margin * margin;
                    for row in 0..batch.rows() {
                        let value = batch.get(row, col);
                        let clamped = value.clamp(lo, hi);
                        if clamped != value {
                            mapped.set(row, col, clamped);
                            flags[row] = true;
                        }
                    }
                }
                Ok((mapped, Some(flags)))
            }
        }
    }

    /// Run the bundle over `data`, producing a [`BundleResult`].
    ///
    /// Steps, in order: normalize the input (reading record files when paths
    /// were given), check the record width against the declared parameters,
    /// pair up data ids, gate on runnability, optionally remap, apply the
    /// pre-transform hook, predict, apply the post-transform hook, package
    /// the result. If the estimator was cold before the call it is released
    /// afterwards (one-shot load/predict/release for the dynamic policy).
    pub fn run(
        &self,
        data: impl Into<RunInput>,
        remap: bool,
        data_ids: Option<Vec<String>>,
    ) -> Result<BundleResult> {
        info!(id = %self.id, "running bundle");

        // 1. Normalize input.
        let (data, data_ids) = match data.into() {
            RunInput::Records(batch) => (batch, data_ids),
            RunInput::Paths(paths) => {
                let ids = data_ids.or_else(|| {
                    Some(
                        paths
                            .iter()
                            .map(|p| p.to_string_lossy().into_owned())
                            .collect(),
                    )
                });
                (self.read_records(&paths)?, ids)
            }
        };

        // 2. Record width must match the declared parameter count.
        let expected = self.configuration.parameters()?.len();
        if data.width() != expected {
            return Err(BundleError::ShapeMismatch {
                expected,
                actual: data.width(),
            }
            .into());
        }
        debug!(id = %self.id, rows = data.rows(), "input data validated");

        // 3. Data ids pair up with rows, one string each.
        if let Some(ids) = &data_ids {
            if ids.len() != data.rows() {
                return Err(BundleError::IdCountMismatch {
                    rows: data.rows(),
                    ids: ids.len(),
                }
                .into());
            }
        }

        // 4-9 hold the estimator lock: the cold/warm check, prediction and
        // the one-shot release must be atomic under the dynamic policy.
        let mut handle = self.estimator.lock();
        let was_loaded = handle.is_loaded();

        if !self.configuration.is_validated() {
            return Err(BundleError::NotRunnable(self.id.clone()).into());
        }
        if !was_loaded {
            debug!(id = %self.id, "loading estimator on demand");
            handle.load()?;
        }

        // 5. Optional remap.
        let (data, remap_flags) = if remap {
            info!(id = %self.id, "mapping data");
            self.map_records(&data)?
        } else {
            (data, None)
        };

        // 6. Pre-transform hook (identity when absent).
        let transformed = match self.hooks.as_ref().and_then(|h| h.transform.as_ref()) {
            Some(hook) => {
                debug!(id = %self.id, "transforming data");
                hook.apply(&data)
            }
            None => data.clone(),
        };

        // 7. Predict.
        info!(id = %self.id, "performing prediction");
        let mut predictions = handle.predict(&transformed)?;

        // 8. Post-transform hook.
        if let Some(hook) = self
            .hooks
            .as_ref()
            .and_then(|h| h.transform_predictions.as_ref())
        {
            debug!(id = %self.id, "transforming predictions");
            predictions = hook.apply(&predictions);
        }

        // 9. One-shot release when the estimator was cold before this call.
        if !was_loaded {
            debug!(id = %self.id, "clearing estimator from memory");
            handle.clear();
        }
        drop(handle);

        let result = BundleResult::new(
            self.id.clone(),
            self.configuration.snapshot(),
            data,
            data_ids,
            remap_flags,
            predictions,
        );
        info!(id = %self.id, "prediction finished, result returned");
        Ok(result)
    }
}
