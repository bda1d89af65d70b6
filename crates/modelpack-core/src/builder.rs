//! Bundle builder: assembles a complete bundle folder from a trained model
//! and declarative settings, stamping the integrity manifest last.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::bundle::CONFIGURATION_FILE;
use crate::checksum::{ChecksumManifest, MANIFEST_FILE};
use crate::document::DocValue;
use crate::error::{BundleError, Result};
use crate::estimator::{BackendKind, EstimatorHandle, LinearModel};
use crate::hooks::{HookSet, HOOKS_FILE};
use crate::tabular::RecordSelector;
use crate::types::{EstimatorType, ParameterSpec, RecordBatch};
use crate::validation::{BundleConfiguration, ValidationOptions, RUNTIME_VERSION};

/// Assembles bundle folders.
///
/// The builder collects the estimator, its configuration and optional hooks
/// in memory; [`BundleBuilder::make`] writes everything to disk, computes
/// the integrity manifest over the finished folder, and re-validates the
/// freshly written card as a self-check.
#[derive(Debug)]
pub struct BundleBuilder {
    location: PathBuf,
    configuration: BundleConfiguration,
    model: Option<LinearModel>,
    kind: Option<BackendKind>,
    hooks: Option<HookSet>,
    data: Vec<(String, RecordBatch)>,
}

impl BundleBuilder {
    /// Start a bundle at `location`.
    ///
    /// # Errors
    ///
    /// `BundleError::FolderExists` when `location` already holds files and
    /// `overwrite` is off.
    pub fn new(
        default_id: impl Into<String>,
        location: impl AsRef<Path>,
        version: i64,
        overwrite: bool,
    ) -> Result<Self> {
        let location = location.as_ref().to_path_buf();
        let occupied = location
            .read_dir()
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if occupied && !overwrite {
            return Err(BundleError::FolderExists(location).into());
        }
        std::fs::create_dir_all(&location).map_err(|source| BundleError::Io {
            path: location.clone(),
            source,
        })?;

        let mut configuration = BundleConfiguration::new();
        {
            let doc = configuration.document_mut();
            doc.set("catalog_id", DocValue::Null);
            doc.set("default_id", default_id.into());
            doc.set("bundle_version", version);
            doc.set(
                "runtime_version",
                DocValue::Sequence(vec![DocValue::from(RUNTIME_VERSION)]),
            );
            doc.set("libraries", DocValue::Mapping(serde_yaml::Mapping::new()));
            doc.set("filereader", false);
            doc.set("mapping", false);
        }
        info!(location = %location.display(), "bundle builder started");
        Ok(BundleBuilder {
            location,
            configuration,
            model: None,
            kind: None,
            hooks: None,
            data: Vec::new(),
        })
    }

    /// Set the estimator: the trained model, its codec, what it estimates,
    /// and how its output is to be read.
    pub fn set_estimator(
        &mut self,
        model: LinearModel,
        kind: BackendKind,
        estimator_type: EstimatorType,
        output: impl Into<String>,
    ) -> &mut Self {
        let doc = self.configuration.document_mut();
        doc.set("class", kind.class_name());
        doc.set("type", estimator_type.as_str());
        doc.set("output", output.into());
        let codec = match kind {
            BackendKind::Json => "serde_json",
            BackendKind::Binary => "bincode",
        };
        let mut libraries = serde_yaml::Mapping::new();
        libraries.insert(
            DocValue::from(codec),
            DocValue::Sequence(vec![DocValue::from(match kind {
                BackendKind::Json => "1.0",
                BackendKind::Binary => "1.3",
            })]),
        );
        doc.set("libraries", DocValue::Mapping(libraries));
        self.model = Some(model);
        self.kind = Some(kind);
        self
    }

    /// Declare the classifier's class labels.
    pub fn set_classes(&mut self, classes: &BTreeMap<u32, String>) -> &mut Self {
        let mut mapping = serde_yaml::Mapping::new();
        for (index, label) in classes {
            mapping.insert(DocValue::from(u64::from(*index)), DocValue::from(label.clone()));
        }
        self.configuration
            .document_mut()
            .set("classes", DocValue::Mapping(mapping));
        self
    }

    /// Declare the input parameters.
    pub fn set_parameters(&mut self, parameters: &[ParameterSpec]) -> &mut Self {
        let rows: Vec<DocValue> = parameters
            .iter()
            .map(|p| {
                DocValue::Sequence(vec![
                    DocValue::from(p.name.clone()),
                    DocValue::from(p.unit.clone()),
                    DocValue::from(p.min),
                    DocValue::from(p.max),
                ])
            })
            .collect();
        self.configuration
            .document_mut()
            .set("parameters", DocValue::Sequence(rows));
        self
    }

    /// Declare a calibration lookup table for an uncalibrated classifier.
    pub fn set_calibration(&mut self, bins: &[f64], values: &[f64]) -> &mut Self {
        let doc = self.configuration.document_mut();
        doc.set("classifier.calibrated", false);
        doc.set("classifier.calibrate", true);
        doc.set(
            "classifier.calibrate.bins",
            DocValue::Sequence(bins.iter().copied().map(DocValue::from).collect()),
        );
        doc.set(
            "classifier.calibrate.values",
            DocValue::Sequence(values.iter().copied().map(DocValue::from).collect()),
        );
        self
    }

    /// Enable the selector-list file reader.
    pub fn set_filereader(&mut self, selectors: &[RecordSelector]) -> &mut Self {
        let entries: Vec<DocValue> = selectors
            .iter()
            .map(|s| {
                DocValue::Sequence(vec![
                    DocValue::from(s.section.clone()),
                    DocValue::from(s.key.clone()),
                ])
            })
            .collect();
        self.configuration
            .document_mut()
            .set("filereader", DocValue::Sequence(entries));
        self
    }

    /// Declare the file extensions the reader accepts.
    pub fn set_filereader_formats(&mut self, formats: &[&str]) -> &mut Self {
        self.configuration.document_mut().set(
            "filereader.formats",
            DocValue::Sequence(formats.iter().map(|f| DocValue::from(*f)).collect()),
        );
        self
    }

    /// Enable margin remapping with the given margin.
    pub fn set_mapping_margin(&mut self, margin: f64) -> &mut Self {
        self.configuration.document_mut().set("mapping", margin);
        self
    }

    /// Ship a hooks file with the bundle.
    pub fn set_hooks(&mut self, hooks: HookSet) -> &mut Self {
        self.hooks = Some(hooks);
        self
    }

    /// Persist a named record batch under `data/`.
    pub fn add_data(&mut self, name: impl Into<String>, batch: RecordBatch) -> &mut Self {
        self.data.push((name.into(), batch));
        self
    }

    /// Set an arbitrary card entry.
    pub fn configure(&mut self, key: impl Into<String>, value: impl Into<DocValue>) -> &mut Self {
        self.configuration.document_mut().set(key, value);
        self
    }

    /// Write the bundle folder: hooks, persisted data, configuration card,
    /// estimator artifact, and finally the integrity manifest. The freshly
    /// written card is validated as a self-check; defaulted fields are
    /// reported but do not fail the build.
    pub fn make(&mut self) -> Result<PathBuf> {
        let kind = self.kind.ok_or(BundleError::NoEstimator)?;
        let model = self.model.as_ref().ok_or(BundleError::NoEstimator)?;

        if let Some(hooks) = &self.hooks {
            let path = self.location.join(HOOKS_FILE);
            let text = serde_yaml::to_string(hooks).map_err(|e| BundleError::ArtifactDecode {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            std::fs::write(&path, text).map_err(|source| BundleError::Io { path, source })?;
        }

        if !self.data.is_empty() {
            let data_dir = self.location.join("data");
            std::fs::create_dir_all(&data_dir).map_err(|source| BundleError::Io {
                path: data_dir.clone(),
                source,
            })?;
            for (name, batch) in &self.data {
                let path = data_dir.join(format!("{name}.json"));
                let text =
                    serde_json::to_string(batch).map_err(|e| BundleError::ArtifactDecode {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                std::fs::write(&path, text).map_err(|source| BundleError::Io { path, source })?;
            }
        }

        self.configuration
            .document()
            .save(self.location.join(CONFIGURATION_FILE))?;
        EstimatorHandle::write_artifact(kind, &self.location, model)?;
        write_checksums(&self.location)?;

        // Self-check: the folder we just wrote must load and validate.
        let mut written = BundleConfiguration::load(self.location.join(CONFIGURATION_FILE))?;
        let report = written.validate_with(&ValidationOptions::default())?;
        if !report.clean() {
            warn!(
                defaulted = ?report.defaulted_steps().collect::<Vec<_>>(),
                "built bundle validates, but some fields fall back to defaults"
            );
        }
        info!(location = %self.location.display(), "bundle written");
        Ok(self.location.clone())
    }
}

/// Recompute and store the integrity manifest for a bundle folder. Public
/// so a folder can be re-stamped after manual edits.
pub fn write_checksums(folder: impl AsRef<Path>) -> Result<()> {
    let folder = folder.as_ref();
    ChecksumManifest::compute(folder)?.write(folder.join(MANIFEST_FILE))
}
