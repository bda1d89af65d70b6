//! Bundle configuration and its validation pipeline.
//!
//! [`BundleConfiguration`] specializes [`ConfigurationDocument`] with the
//! fields a bundle's configuration card defines and a fixed, ordered
//! pipeline of validation steps. Each step reads its field, fills in a
//! default when the field is absent, coerces or normalizes the value in
//! place, and cross-checks interdependent fields. Outcomes are recorded per
//! step ([`ValidationReport`]); violations with no safe fallback abort the
//! pipeline with [`crate::error::ConfigurationError`].
//!
//! The split between fatal and defaulted tracks whether the runtime has any
//! safe fallback: fields governing how estimator output is interpreted
//! (`class`, `type`, `output`, `classes`, `parameters`, calibration data)
//! are fatal, while optional conveniences (integrity manifest, file reader,
//! remapping) degrade to "feature disabled".
//!
//! Step order matters: the classifier calibration steps branch on the
//! resolved `type`, and the file-reader step needs the validated parameter
//! count. Later steps may assume earlier ones completed.

mod report;
mod steps;


pub use report::{StepOutcome, StepRecord, ValidationReport};

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::document::{ConfigurationDocument, DocValue};
use crate::error::{ConfigurationError, Result};
use crate::estimator::BackendKind;
use crate::tabular::RecordSelector;
use crate::types::{EstimatorType, ParameterSpec};

/// Version string of this runtime, matched against the card's declared
/// supported-version list.
pub const RUNTIME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length of a generated default bundle id.
pub(crate) const DEFAULT_ID_LEN: usize = 5;

/// Artifact codec libraries this runtime links, with their compiled
/// versions. The library-dependency step checks declared requirements
/// against this closed table.
pub(crate) const SUPPORTED_LIBRARIES: &[(&str, &str)] =
    &[("serde_json", "1.0"), ("bincode", "1.3")];

/// Upper bound (exclusive) for the numeric remapping margin; at 0.5 the
/// squared margin would close the clamp interval entirely for unit ranges.
pub(crate) const MAPPING_MARGIN_MAX: f64 = 0.5;

// ============================================================================
// OPTIONS AND DERIVED MODES
// ============================================================================

/// Knobs for a validation run.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Verify the stored integrity manifest (advisory; never fatal).
    pub verify_checksums: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            verify_checksums: true,
        }
    }
}

/// How the bundle reads record files, as resolved by validation.
#[derive(Debug, Clone, PartialEq)]
pub enum FileReaderMode {
    /// No file reading; path input is an error.
    Disabled,
    /// The bundle's `read` hook extracts records.
    Hook,
    /// Extract the listed `(section, key)` entries, one per parameter.
    Selectors(Vec<RecordSelector>),
}

/// How the bundle remaps out-of-range inputs, as resolved by validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MappingMode {
    /// No remapping.
    Disabled,
    /// The bundle's `map` hook remaps.
    Hook,
    /// Clamp each parameter into `[min + f², max − f²]`.
    Margin(f64),
}

// ============================================================================
// BUNDLE CONFIGURATION
// ============================================================================

/// A bundle's configuration card plus its validation state.
///
/// `validated` starts `false` and becomes `true` only after the full
/// pipeline completes without a fatal error; it gates whether the owning
/// bundle is runnable. Changes made by validation live in memory only.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BundleConfiguration {
    doc: ConfigurationDocument,
    validated: bool,
}

impl BundleConfiguration {
    /// An empty, unvalidated configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration card from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(BundleConfiguration {
            doc: ConfigurationDocument::load(path)?,
            validated: false,
        })
    }

    /// Wrap an in-memory document.
    #[must_use]
    pub fn from_document(doc: ConfigurationDocument) -> Self {
        BundleConfiguration {
            doc,
            validated: false,
        }
    }

    /// The underlying document.
    #[must_use]
    pub fn document(&self) -> &ConfigurationDocument {
        &self.doc
    }

    /// Mutable access to the underlying document. Mutating fields the
    /// pipeline owns resets nothing; re-validate afterwards.
    pub fn document_mut(&mut self) -> &mut ConfigurationDocument {
        &mut self.doc
    }

    /// Whether the full pipeline has completed on this configuration.
    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Independent value copy, used for result snapshots.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    /// Run the full validation pipeline with default options.
    pub fn validate(&mut self) -> Result<ValidationReport> {
        self.validate_with(&ValidationOptions::default())
    }

    /// Run the full validation pipeline.
    ///
    /// On success the configuration is marked validated and the per-step
    /// report is returned; [`ValidationReport::clean`] is `true` only when
    /// no step had to repair anything. Fatal violations abort immediately.
    pub fn validate_with(&mut self, options: &ValidationOptions) -> Result<ValidationReport> {
        info!("validating bundle configuration");
        let mut report = ValidationReport::new();

        // General information.
        self.step_catalog_id(&mut report);
        self.step_default_id(&mut report);
        self.step_bundle_version(&mut report);
        self.step_runtime_version(&mut report);
        self.step_class(&mut report)?;
        self.step_libraries(&mut report)?;
        self.step_type(&mut report)?;
        self.step_output_and_classes(&mut report)?;
        if options.verify_checksums {
            self.step_checksums(&mut report);
        }

        // Parameters.
        self.step_parameters(&mut report)?;

        // Estimator-type specifics.
        if self.estimator_type()? == EstimatorType::Classifier {
            self.step_classifier_calibrated(&mut report);
            if !self.doc.get_bool("classifier.calibrated").unwrap_or(true) {
                self.step_classifier_calibrate(&mut report);
                if self.doc.get_bool("classifier.calibrate").unwrap_or(false) {
                    self.step_calibration_data(&mut report)?;
                }
            }
        }

        // File reading and mapping.
        self.step_filereader(&mut report);
        self.step_filereader_formats(&mut report);
        self.step_mapping(&mut report);

        self.validated = true;
        if report.clean() {
            info!("configuration valid");
        } else {
            warn!(
                defaulted = ?report.defaulted_steps().collect::<Vec<_>>(),
                "configuration did not fully specify bundle behaviour; some \
                 fields were inferred or set to defaults"
            );
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Typed accessors (valid after the pipeline has run)
    // ------------------------------------------------------------------

    /// Catalog id used for update lookups, if the bundle is catalogued.
    #[must_use]
    pub fn catalog_id(&self) -> Option<String> {
        match self.doc.get_opt("catalog_id") {
            Some(DocValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Fallback bundle id from the card.
    pub fn default_id(&self) -> Result<String> {
        Ok(self.doc.get_str("default_id")?.to_string())
    }

    /// Declared bundle version (defaults to 1).
    #[must_use]
    pub fn bundle_version(&self) -> i64 {
        self.doc.get_i64("bundle_version").unwrap_or(1)
    }

    /// Validated backend codec.
    pub fn backend_kind(&self) -> Result<BackendKind> {
        let class = self.doc.get_str("class")?;
        BackendKind::from_class(class)
            .ok_or_else(|| ConfigurationError::UnknownBackendClass(class.to_string()).into())
    }

    /// Validated estimator type.
    pub fn estimator_type(&self) -> Result<EstimatorType> {
        let value = self.doc.get_str("type")?;
        EstimatorType::from_card(value)
            .ok_or_else(|| ConfigurationError::UnknownEstimatorType(value.to_string()).into())
    }

    /// Output descriptor.
    pub fn output(&self) -> Result<String> {
        Ok(self.doc.get_str("output")?.to_string())
    }

    /// Class-index to label mapping (classifier bundles).
    pub fn classes(&self) -> Result<BTreeMap<u32, String>> {
        let map = self.doc.get_map("classes")?;
        let mut classes = BTreeMap::new();
        for (key, value) in map {
            let index = doc_key_as_u32(key).ok_or_else(|| {
                ConfigurationError::ClassKeyNotInteger(render_key(key))
            })?;
            classes.insert(index, scalar_to_string(value));
        }
        Ok(classes)
    }

    /// Validated parameter specifications, in declaration order.
    pub fn parameters(&self) -> Result<Vec<ParameterSpec>> {
        let rows = self.doc.get_list("parameters")?;
        let mut specs = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let DocValue::Sequence(fields) = row else {
                return Err(ConfigurationError::ParameterFormat { index }.into());
            };
            if fields.len() != 4 {
                return Err(ConfigurationError::ParameterFormat { index }.into());
            }
            let (Some(name), Some(unit), Some(min), Some(max)) = (
                fields[0].as_str(),
                fields[1].as_str(),
                fields[2].as_f64(),
                fields[3].as_f64(),
            ) else {
                return Err(ConfigurationError::ParameterFormat { index }.into());
            };
            specs.push(ParameterSpec {
                name: name.to_string(),
                unit: unit.to_string(),
                min,
                max,
            });
        }
        Ok(specs)
    }

    /// Calibration lookup table, when the card defines one that applies:
    /// classifier, not pre-calibrated, calibrate-on-load enabled.
    #[must_use]
    pub fn calibration(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        if self.estimator_type().ok()? != EstimatorType::Classifier {
            return None;
        }
        if self.doc.get_bool("classifier.calibrated").unwrap_or(true) {
            return None;
        }
        if !self.doc.get_bool("classifier.calibrate").unwrap_or(false) {
            return None;
        }
        let bins = number_list(self.doc.get_opt("classifier.calibrate.bins")?)?;
        let values = number_list(self.doc.get_opt("classifier.calibrate.values")?)?;
        Some((bins, values))
    }

    /// Resolved file-reading mode.
    #[must_use]
    pub fn filereader(&self) -> FileReaderMode {
        match self.doc.get_opt("filereader") {
            Some(DocValue::String(s)) if s == "function" => FileReaderMode::Hook,
            Some(DocValue::Sequence(entries)) => {
                let mut selectors = Vec::with_capacity(entries.len());
                for entry in entries {
                    let DocValue::Sequence(pair) = entry else {
                        return FileReaderMode::Disabled;
                    };
                    let (Some(section), Some(key)) = (
                        pair.first().map(scalar_to_string),
                        pair.get(1).map(scalar_to_string),
                    ) else {
                        return FileReaderMode::Disabled;
                    };
                    selectors.push(RecordSelector::new(section, key));
                }
                FileReaderMode::Selectors(selectors)
            }
            _ => FileReaderMode::Disabled,
        }
    }

    /// File extensions the reader accepts, when declared.
    #[must_use]
    pub fn filereader_formats(&self) -> Option<Vec<String>> {
        match self.doc.get_opt("filereader.formats")? {
            DocValue::Sequence(entries) => Some(
                entries
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            DocValue::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }

    /// Resolved remapping mode.
    #[must_use]
    pub fn mapping(&self) -> MappingMode {
        match self.doc.get_opt("mapping") {
            Some(DocValue::String(s)) if s == "function" => MappingMode::Hook,
            Some(DocValue::Number(n)) => n.as_f64().map_or(MappingMode::Disabled, MappingMode::Margin),
            Some(DocValue::Bool(true)) => MappingMode::Margin(0.0),
            _ => MappingMode::Disabled,
        }
    }
}

// ============================================================================
// VALUE HELPERS
// ============================================================================

/// Truthiness coercion for fields the pipeline normalizes to booleans.
pub(crate) fn coerce_bool(value: &DocValue) -> bool {
    match value {
        DocValue::Null => false,
        DocValue::Bool(b) => *b,
        DocValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        DocValue::String(s) => !s.is_empty() && s != "false",
        DocValue::Sequence(s) => !s.is_empty(),
        DocValue::Mapping(m) => !m.is_empty(),
        DocValue::Tagged(_) => false,
    }
}

/// Render a scalar document value as a plain string.
pub(crate) fn scalar_to_string(value: &DocValue) -> String {
    match value {
        DocValue::String(s) => s.clone(),
        DocValue::Number(n) => n.to_string(),
        DocValue::Bool(b) => b.to_string(),
        DocValue::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

pub(crate) fn render_key(key: &DocValue) -> String {
    scalar_to_string(key)
}

/// Interpret a mapping key as a non-negative class index.
pub(crate) fn doc_key_as_u32(key: &DocValue) -> Option<u32> {
    match key {
        DocValue::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        DocValue::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

fn number_list(value: &DocValue) -> Option<Vec<f64>> {
    let DocValue::Sequence(entries) = value else {
        return None;
    };
    entries.iter().map(DocValue::as_f64).collect()
}
