//! The individual validation steps, in pipeline order.
//!
//! Non-fatal steps record a [`StepOutcome`] and repair the document in
//! place; fatal steps return `Err` and abort the pipeline. Field names and
//! repair behaviour are part of the configuration-card contract, so every
//! message names the field it talks about.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, error, warn};

use crate::checksum::{ChecksumManifest, MANIFEST_FILE};
use crate::document::{value_shape, DocValue};
use crate::error::{ConfigurationError, Result};
use crate::estimator::BackendKind;
use crate::hooks::HookSet;
use crate::types::EstimatorType;

use super::{
    coerce_bool, doc_key_as_u32, render_key, BundleConfiguration, StepOutcome, ValidationReport,
    DEFAULT_ID_LEN, MAPPING_MARGIN_MAX, RUNTIME_VERSION, SUPPORTED_LIBRARIES,
};

fn random_id(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

impl BundleConfiguration {
    /// `catalog_id`: optional reference into a bundle catalog. Absence is
    /// normal for locally built bundles.
    pub(super) fn step_catalog_id(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("catalog_id") {
            debug!("configuration entry 'catalog_id' not found; set to null");
            self.doc.set("catalog_id", DocValue::Null);
            report.record_with("catalog_id", StepOutcome::Defaulted, "set to null");
        } else {
            report.record("catalog_id", StepOutcome::Valid);
        }
    }

    /// `default_id`: fallback bundle id. A random alphanumeric id is
    /// generated when absent.
    pub(super) fn step_default_id(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("default_id") {
            let id = random_id(DEFAULT_ID_LEN);
            warn!(generated = %id, "no default id was found; generated a random one");
            self.doc.set("default_id", id);
            report.record_with("default_id", StepOutcome::Defaulted, "generated random id");
        } else {
            debug!("configuration entry 'default_id' was validly defined");
            report.record("default_id", StepOutcome::Valid);
        }
    }

    /// `bundle_version`: version of this bundle, for update lookups.
    pub(super) fn step_bundle_version(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("bundle_version") {
            warn!("no version number provided for this bundle; assuming 1");
            self.doc.set("bundle_version", 1);
            report.record_with("bundle_version", StepOutcome::Defaulted, "assumed version 1");
        } else {
            debug!("configuration entry 'bundle_version' was validly defined");
            report.record("bundle_version", StepOutcome::Valid);
        }
    }

    /// `runtime_version`: runtime versions the bundle declares support for.
    /// A scalar is coerced to a one-element list; the current runtime not
    /// being listed is only flagged.
    pub(super) fn step_runtime_version(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("runtime_version") {
            warn!("no supported runtime version declared; assuming the current one is supported");
            report.record_with(
                "runtime_version",
                StepOutcome::Defaulted,
                "no declared runtime versions",
            );
            return;
        }
        let value = self.doc.get_opt("runtime_version").cloned();
        let listed: Vec<DocValue> = match value {
            Some(DocValue::Sequence(seq)) => seq,
            Some(scalar) => {
                let seq = vec![scalar];
                self.doc
                    .set("runtime_version", DocValue::Sequence(seq.clone()));
                seq
            }
            None => Vec::new(),
        };
        let supported = listed
            .iter()
            .any(|v| super::scalar_to_string(v) == RUNTIME_VERSION);
        if supported {
            debug!("configuration entry 'runtime_version' was validly defined");
            report.record("runtime_version", StepOutcome::Valid);
        } else {
            warn!(
                runtime = RUNTIME_VERSION,
                "this bundle does not explicitly support the current runtime \
                 version; continuing, but errors may occur"
            );
            report.record_with(
                "runtime_version",
                StepOutcome::Defaulted,
                format!("runtime {RUNTIME_VERSION} not in declared list"),
            );
        }
    }

    /// `class`: estimator backend codec. Fatal when absent or unknown —
    /// there is no safe guess for how to decode the artifact.
    pub(super) fn step_class(&mut self, report: &mut ValidationReport) -> Result<()> {
        if !self.doc.contains("class") {
            error!("no class was provided for the bundle estimator");
            return Err(ConfigurationError::NoBackendClass.into());
        }
        let class = match self.doc.get("class")? {
            DocValue::String(s) => s.to_lowercase(),
            other => {
                error!(shape = value_shape(other), "estimator class must be a string");
                return Err(ConfigurationError::WrongType {
                    key: "class".to_string(),
                    expected: "string",
                    actual: value_shape(other),
                }
                .into());
            }
        };
        if BackendKind::from_class(&class).is_none() {
            error!(class = %class, "backend class is not implemented in this runtime");
            return Err(ConfigurationError::UnknownBackendClass(class).into());
        }
        self.doc.set("class", class);
        debug!("configuration entry 'class' was validly defined");
        report.record("class", StepOutcome::Valid);
        Ok(())
    }

    /// `libraries`: codec libraries the bundle needs, with version pins.
    /// A library this runtime does not link at all is fatal; a version pin
    /// that does not list the linked version is only flagged.
    pub(super) fn step_libraries(&mut self, report: &mut ValidationReport) -> Result<()> {
        if !self.doc.contains("libraries") {
            warn!("no information was provided on needed libraries; this might cause problems during prediction");
            report.record_with("libraries", StepOutcome::Defaulted, "no library information");
            return Ok(());
        }
        let declared = self.doc.get_map("libraries")?.clone();
        let mut unsupported = 0usize;
        for (name, versions) in &declared {
            let name = render_key(name);
            if matches!(versions, DocValue::Null) {
                continue;
            }
            let Some((_, linked)) = SUPPORTED_LIBRARIES.iter().find(|(lib, _)| *lib == name)
            else {
                error!(library = %name, "bundle uses a library that is not available in this runtime");
                return Err(ConfigurationError::LibraryMissing(name).into());
            };
            let pins: Vec<String> = match versions {
                DocValue::Sequence(seq) => seq.iter().map(super::scalar_to_string).collect(),
                scalar => vec![super::scalar_to_string(scalar)],
            };
            if !pins.iter().any(|pin| pin == linked) {
                warn!(
                    library = %name,
                    linked = %linked,
                    "explicitly supported versions of this library do not list \
                     the linked one; this might cause errors down the line"
                );
                unsupported += 1;
            }
        }
        if unsupported == 0 {
            debug!("configuration entry 'libraries' was validly defined");
            report.record("libraries", StepOutcome::Valid);
        } else {
            report.record_with(
                "libraries",
                StepOutcome::Defaulted,
                format!("{unsupported} library pin(s) do not cover the linked version"),
            );
        }
        Ok(())
    }

    /// `type`: classifier or regressor. Fatal when absent or unknown.
    pub(super) fn step_type(&mut self, report: &mut ValidationReport) -> Result<()> {
        if !self.doc.contains("type") {
            error!("no estimator type was defined");
            return Err(ConfigurationError::NoEstimatorType.into());
        }
        let value = match self.doc.get("type")? {
            DocValue::String(s) => s.clone(),
            other => {
                error!(shape = value_shape(other), "estimator type must be a string");
                return Err(ConfigurationError::UnknownEstimatorType(
                    super::scalar_to_string(other),
                )
                .into());
            }
        };
        if EstimatorType::from_card(&value).is_none() {
            error!(value = %value, "estimator type was not recognized");
            return Err(ConfigurationError::UnknownEstimatorType(value).into());
        }
        debug!("configuration entry 'type' was validly defined");
        report.record("type", StepOutcome::Valid);
        Ok(())
    }

    /// `output` (and `classes` for classifiers): how to interpret estimator
    /// output. Fatal on every violation — guessing wrong silently corrupts
    /// every downstream prediction.
    pub(super) fn step_output_and_classes(&mut self, report: &mut ValidationReport) -> Result<()> {
        if !self.doc.contains("output") {
            error!("no information on estimator output was provided");
            return Err(ConfigurationError::OutputMissing.into());
        }
        if !matches!(self.doc.get("output")?, DocValue::String(_)) {
            error!("estimator output must be defined as a string");
            return Err(ConfigurationError::OutputNotString.into());
        }

        if self.estimator_type()? == EstimatorType::Classifier {
            if !self.doc.contains("classes") {
                error!("no information on estimator classes was provided");
                return Err(ConfigurationError::ClassesMissing.into());
            }
            let DocValue::Mapping(map) = self.doc.get("classes")?.clone() else {
                error!("estimator classes must be defined as a mapping");
                return Err(ConfigurationError::ClassesNotMap.into());
            };
            // Normalize keys to non-negative integers in place.
            let mut normalized = serde_yaml::Mapping::new();
            for (key, value) in map {
                let Some(index) = doc_key_as_u32(&key) else {
                    error!(key = %render_key(&key), "classes mapping keys must be non-negative integers");
                    return Err(ConfigurationError::ClassKeyNotInteger(render_key(&key)).into());
                };
                normalized.insert(DocValue::from(u64::from(index)), value);
            }
            self.doc.set("classes", DocValue::Mapping(normalized));
            debug!("configuration entry 'classes' was validly defined");
        }

        debug!("configuration entry 'output' was validly defined");
        report.record("output", StepOutcome::Valid);
        Ok(())
    }

    /// Integrity manifest verification. Advisory only: every failure path
    /// flags and continues, nothing here can abort a load.
    pub(super) fn step_checksums(&mut self, report: &mut ValidationReport) {
        let Some(folder) = self.doc.folder().map(std::path::Path::to_path_buf) else {
            warn!("configuration has no source folder; could not check data integrity");
            report.record_with("checksums", StepOutcome::Defaulted, "no source folder");
            return;
        };
        let stored = match ChecksumManifest::read(folder.join(MANIFEST_FILE)) {
            Ok(manifest) => manifest,
            Err(_) => {
                warn!("no checksum manifest found; could not check if data is uncorrupted");
                report.record_with("checksums", StepOutcome::Defaulted, "no manifest found");
                return;
            }
        };
        let computed = match ChecksumManifest::compute(&folder) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(error = %e, "could not recompute bundle checksums");
                report.record_with("checksums", StepOutcome::Defaulted, "recomputation failed");
                return;
            }
        };
        let mut invalid = Vec::new();
        for (name, digest) in computed.entries() {
            let Some(stored_digest) = stored.get(name) else {
                warn!(entry = %name, "no checksum stored for entry; could not check if data is uncorrupted");
                report.record_with(
                    "checksums",
                    StepOutcome::Defaulted,
                    format!("no stored checksum for '{name}'"),
                );
                return;
            };
            if stored_digest != digest {
                invalid.push(name.to_string());
            }
        }
        if invalid.is_empty() {
            debug!("checksums are valid");
            report.record("checksums", StepOutcome::Valid);
        } else {
            warn!(
                entries = ?invalid,
                "checksums of these entries are invalid; this hints at \
                 corruption of data (or at the very least: the data has been \
                 changed); use with care and if possible re-fetch the bundle"
            );
            report.record_with(
                "checksums",
                StepOutcome::Defaulted,
                format!("mismatched: {}", invalid.join(", ")),
            );
        }
    }

    /// `parameters`: the input contract. Fatal on every violation; rows are
    /// normalized to `[name, unit, min, max]` with numeric bounds.
    pub(super) fn step_parameters(&mut self, report: &mut ValidationReport) -> Result<()> {
        if !self.doc.contains("parameters") {
            error!("no parameter information was provided");
            return Err(ConfigurationError::ParametersMissing.into());
        }
        // Parse strictly; `parameters()` performs the same checks, so run it
        // once here and persist the normalized rows.
        let specs = self.parameters().map_err(|e| {
            error!("parameter definitions do not follow the [name, unit, min, max] format");
            e
        })?;
        for spec in &specs {
            if spec.min > spec.max {
                error!(parameter = %spec.name, "parameter range is inverted");
                return Err(ConfigurationError::ParameterRange {
                    name: spec.name.clone(),
                    min: spec.min,
                    max: spec.max,
                }
                .into());
            }
        }
        let rows: Vec<DocValue> = specs
            .iter()
            .map(|s| {
                DocValue::Sequence(vec![
                    DocValue::from(s.name.clone()),
                    DocValue::from(s.unit.clone()),
                    DocValue::from(s.min),
                    DocValue::from(s.max),
                ])
            })
            .collect();
        self.doc.set("parameters", DocValue::Sequence(rows));
        debug!("configuration entry 'parameters' was validly defined");
        report.record("parameters", StepOutcome::Valid);
        Ok(())
    }

    /// `classifier.calibrated`: whether the stored classifier already emits
    /// calibrated scores. Absent means uncalibrated.
    pub(super) fn step_classifier_calibrated(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("classifier.calibrated") {
            warn!("no calibration information was provided; assuming the classifier is not calibrated");
            self.doc.set("classifier.calibrated", false);
            report.record_with(
                "classifier.calibrated",
                StepOutcome::Defaulted,
                "assumed uncalibrated",
            );
            return;
        }
        let coerced = coerce_bool(self.doc.get_opt("classifier.calibrated").unwrap_or(&DocValue::Null));
        self.doc.set("classifier.calibrated", coerced);
        debug!("configuration entry 'classifier.calibrated' was validly defined");
        report.record("classifier.calibrated", StepOutcome::Valid);
    }

    /// `classifier.calibrate`: whether the runtime should calibrate scores
    /// through the card's lookup table. Absent means no.
    pub(super) fn step_classifier_calibrate(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("classifier.calibrate") {
            warn!("no information provided on whether to calibrate classifier output; assuming not");
            self.doc.set("classifier.calibrate", false);
            report.record_with(
                "classifier.calibrate",
                StepOutcome::Defaulted,
                "assumed no calibration",
            );
            return;
        }
        let coerced = coerce_bool(self.doc.get_opt("classifier.calibrate").unwrap_or(&DocValue::Null));
        self.doc.set("classifier.calibrate", coerced);
        debug!("configuration entry 'classifier.calibrate' was validly defined");
        report.record("classifier.calibrate", StepOutcome::Valid);
    }

    /// `classifier.calibrate.bins` / `.values`: the calibration lookup
    /// table. Only reached when calibration was requested, at which point a
    /// missing or malformed table is fatal. The calibrate flag is switched
    /// off before raising so a caught error leaves a consistent document.
    pub(super) fn step_calibration_data(&mut self, report: &mut ValidationReport) -> Result<()> {
        const TABLE: [(&str, &str); 2] = [
            ("classifier.calibrate.bins", "bins"),
            ("classifier.calibrate.values", "values"),
        ];
        for (key, what) in TABLE {
            if !self.doc.contains(key) {
                self.doc.set("classifier.calibrate", false);
                error!(entry = key, "no calibration information provided; no calibration will take place");
                return Err(ConfigurationError::CalibrationMissing(what).into());
            }
        }
        let mut lists = Vec::with_capacity(2);
        for (key, what) in TABLE {
            let DocValue::Sequence(seq) = self.doc.get(key)?.clone() else {
                self.doc.set("classifier.calibrate", false);
                error!(entry = key, "calibration information is not provided as a list");
                return Err(ConfigurationError::CalibrationNotList(what).into());
            };
            let numbers: Option<Vec<f64>> = seq.iter().map(DocValue::as_f64).collect();
            let Some(numbers) = numbers else {
                self.doc.set("classifier.calibrate", false);
                error!(entry = key, "calibration information is not numeric");
                return Err(ConfigurationError::CalibrationNotList(what).into());
            };
            lists.push((key, numbers));
        }
        let (bins, values) = (&lists[0].1, &lists[1].1);
        if bins.len() != values.len() {
            self.doc.set("classifier.calibrate", false);
            error!("number of calibration bins and values do not correspond; no calibration will take place");
            return Err(ConfigurationError::CalibrationLengthMismatch {
                bins: bins.len(),
                values: values.len(),
            }
            .into());
        }
        for (key, numbers) in lists {
            self.doc.set(
                key,
                DocValue::Sequence(numbers.into_iter().map(DocValue::from).collect()),
            );
        }
        debug!("configuration entries 'classifier.calibrate.bins' and '.values' were validly defined");
        report.record("classifier.calibrate.data", StepOutcome::Valid);
        Ok(())
    }

    /// `filereader`: how record files are turned into input rows. Every
    /// problem degrades to "file reading disabled".
    pub(super) fn step_filereader(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("filereader") {
            warn!("no read mode defined");
            self.doc.set("filereader", DocValue::Null);
            report.record_with("filereader", StepOutcome::Defaulted, "no read mode defined");
            return;
        }

        // `false` and the literal string "none" both mean disabled on
        // purpose; that is a valid card, not a repair.
        match self.doc.get_opt("filereader") {
            Some(DocValue::Bool(false)) => {
                self.doc.set("filereader", DocValue::Null);
            }
            Some(DocValue::String(s)) if s.eq_ignore_ascii_case("none") => {
                self.doc.set("filereader", DocValue::Null);
            }
            _ => {}
        }

        match self.doc.get_opt("filereader").cloned() {
            None | Some(DocValue::Null) => {
                debug!("configuration entry 'filereader' was validly defined");
                report.record("filereader", StepOutcome::Valid);
            }
            Some(DocValue::String(s)) if s == "function" => {
                let hooks = self
                    .doc
                    .folder()
                    .and_then(|folder| HookSet::load(folder).ok().flatten());
                let Some(hooks) = hooks else {
                    warn!("no hooks file could be found in the bundle folder; no automated file reading can take place");
                    self.doc.set("filereader", DocValue::Null);
                    report.record_with("filereader", StepOutcome::Defaulted, "hooks file missing");
                    return;
                };
                let Some(read) = hooks.read else {
                    warn!("no 'read' hook defined in the hooks file; no automated file reading can take place");
                    self.doc.set("filereader", DocValue::Null);
                    report.record_with("filereader", StepOutcome::Defaulted, "read hook missing");
                    return;
                };
                if read.arity != 1 {
                    warn!(
                        arity = read.arity,
                        "the 'read' hook takes a different number of arguments, \
                         1 expected; no automated file reading can take place"
                    );
                    self.doc.set("filereader", DocValue::Null);
                    report.record_with(
                        "filereader",
                        StepOutcome::Defaulted,
                        format!("read hook arity {} != 1", read.arity),
                    );
                    return;
                }
                debug!("configuration entry 'filereader' was validly defined");
                report.record("filereader", StepOutcome::Valid);
            }
            Some(DocValue::Sequence(entries)) => {
                for entry in &entries {
                    let ok = matches!(entry, DocValue::Sequence(pair) if pair.len() == 2);
                    if !ok {
                        warn!("record reader list has an invalid format; no automated file reading can or will take place");
                        self.doc.set("filereader", DocValue::Null);
                        report.record_with(
                            "filereader",
                            StepOutcome::Defaulted,
                            "reader list entries must be [section, key] pairs",
                        );
                        return;
                    }
                }
                let expected = self.parameters().map(|p| p.len()).unwrap_or(0);
                if entries.len() != expected {
                    warn!(
                        entries = entries.len(),
                        parameters = expected,
                        "length of the record reader list should correspond to \
                         the length of the parameter list"
                    );
                    self.doc.set("filereader", DocValue::Null);
                    report.record_with(
                        "filereader",
                        StepOutcome::Defaulted,
                        "reader list length differs from parameter count",
                    );
                    return;
                }
                debug!("configuration entry 'filereader' was validly defined");
                report.record("filereader", StepOutcome::Valid);
            }
            Some(other) => {
                warn!(
                    shape = value_shape(&other),
                    "read mode was not recognized; no reading can or will take place"
                );
                self.doc.set("filereader", DocValue::Null);
                report.record_with("filereader", StepOutcome::Defaulted, "unrecognized read mode");
            }
        }
    }

    /// `filereader.formats`: accepted file extensions. Advisory — an
    /// unparseable declaration only disables the extension warning.
    pub(super) fn step_filereader_formats(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("filereader.formats") {
            self.doc.set("filereader.formats", DocValue::Null);
        }
        match self.doc.get_opt("filereader.formats").cloned() {
            None | Some(DocValue::Null) => {
                warn!("filereader.formats not defined; unclear which file formats can be read");
                report.record_with(
                    "filereader.formats",
                    StepOutcome::Defaulted,
                    "no accepted formats declared",
                );
            }
            Some(DocValue::Sequence(entries)) => {
                let formats: Vec<DocValue> = entries
                    .into_iter()
                    .filter(|v| {
                        let keep = matches!(v, DocValue::String(_));
                        if !keep {
                            warn!("filereader.formats entries must be strings; dropping one");
                        }
                        keep
                    })
                    .collect();
                if formats.is_empty() {
                    warn!("no valid formats defined; no file format validation will be performed");
                    self.doc.set("filereader.formats", DocValue::Null);
                    report.record_with(
                        "filereader.formats",
                        StepOutcome::Defaulted,
                        "no valid formats after filtering",
                    );
                } else {
                    self.doc
                        .set("filereader.formats", DocValue::Sequence(formats));
                    debug!("configuration entry 'filereader.formats' was validly defined");
                    report.record("filereader.formats", StepOutcome::Valid);
                }
            }
            Some(DocValue::String(s)) => {
                self.doc.set(
                    "filereader.formats",
                    DocValue::Sequence(vec![DocValue::from(s)]),
                );
                debug!("configuration entry 'filereader.formats' was validly defined");
                report.record("filereader.formats", StepOutcome::Valid);
            }
            Some(other) => {
                warn!(
                    shape = value_shape(&other),
                    "filereader.formats was not defined as a list or a string; \
                     could not determine which files the reader can read"
                );
                self.doc.set("filereader.formats", DocValue::Null);
                report.record_with(
                    "filereader.formats",
                    StepOutcome::Defaulted,
                    "formats must be a string or list of strings",
                );
            }
        }
    }

    /// `mapping`: out-of-range input remapping. Accepted values: boolean,
    /// a margin float in `[0, 0.5)`, or `"function"`. `true` is normalized
    /// to the float sentinel `0.0`. Every problem degrades to disabled.
    pub(super) fn step_mapping(&mut self, report: &mut ValidationReport) {
        if !self.doc.contains("mapping") {
            warn!("no information was provided on whether mapping should take place; assuming not");
            self.doc.set("mapping", false);
            report.record_with("mapping", StepOutcome::Defaulted, "assumed no mapping");
            return;
        }
        match self.doc.get_opt("mapping").cloned() {
            Some(DocValue::Bool(value)) => {
                if value {
                    self.doc.set("mapping", 0.0);
                }
                debug!("configuration entry 'mapping' was validly defined");
                report.record("mapping", StepOutcome::Valid);
            }
            Some(DocValue::Number(n)) => {
                let margin = n.as_f64().unwrap_or(f64::NAN);
                if margin.is_finite() && (0.0..MAPPING_MARGIN_MAX).contains(&margin) {
                    self.doc.set("mapping", margin);
                    debug!("configuration entry 'mapping' was validly defined");
                    report.record("mapping", StepOutcome::Valid);
                } else {
                    warn!(
                        margin,
                        "mapping margin must lie in [0.0, 0.5); mapping is \
                         disabled for this bundle"
                    );
                    self.doc.set("mapping", false);
                    report.record_with(
                        "mapping",
                        StepOutcome::Defaulted,
                        "margin outside [0.0, 0.5)",
                    );
                }
            }
            Some(DocValue::String(s)) if s == "function" => {
                let hooks = self
                    .doc
                    .folder()
                    .and_then(|folder| HookSet::load(folder).ok().flatten());
                let map_hook = hooks.and_then(|h| h.map);
                match map_hook {
                    Some(hook) if hook.arity == 1 => {
                        debug!("configuration entry 'mapping' was validly defined");
                        report.record("mapping", StepOutcome::Valid);
                    }
                    Some(hook) => {
                        warn!(
                            arity = hook.arity,
                            "the 'map' hook takes a different number of arguments, \
                             1 expected; no data mapping can take place"
                        );
                        self.doc.set("mapping", false);
                        report.record_with(
                            "mapping",
                            StepOutcome::Defaulted,
                            format!("map hook arity {} != 1", hook.arity),
                        );
                    }
                    None => {
                        warn!("no 'map' hook defined in the hooks file; no data mapping can take place");
                        self.doc.set("mapping", false);
                        report.record_with("mapping", StepOutcome::Defaulted, "map hook missing");
                    }
                }
            }
            _ => {
                warn!(
                    "mapping mode was not recognized; has to be false, \
                     'function' or a floating point number; mapping is \
                     disabled for this bundle"
                );
                self.doc.set("mapping", false);
                report.record_with("mapping", StepOutcome::Defaulted, "unrecognized mapping mode");
            }
        }
    }
}
