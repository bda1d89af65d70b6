//! Sub-error types for modelpack-core.
//!
//! Each error type covers a specific domain of failures. The split follows
//! the propagation policy of the runtime: [`ConfigurationError`] variants
//! abort the validation pipeline, the others surface misuse of an otherwise
//! healthy bundle, result set, or registry.

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// CHECKSUM ERROR
// ============================================================================

/// Integrity-manifest and digest computation errors.
///
/// Only *direct* requests error: a file that is absent during directory
/// aggregation contributes a zero digest instead, because integrity
/// checking is advisory and must never abort a bundle load.
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// Direct digest request on a path that does not exist.
    #[error("no file or directory at {path}")]
    Missing {
        /// Path that was requested
        path: PathBuf,
    },

    /// Underlying read failed mid-stream.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being digested
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored manifest line did not split into name and digest.
    #[error("malformed manifest line {line} in {path}")]
    MalformedManifest {
        /// Manifest file being parsed
        path: PathBuf,
        /// 1-indexed offending line
        line: usize,
    },
}

// ============================================================================
// CONFIGURATION ERROR
// ============================================================================

/// Fatal configuration-card violations.
///
/// Every variant corresponds to a field for which the runtime has no safe
/// fallback: guessing would silently corrupt downstream predictions, so the
/// validation pipeline aborts instead. Recoverable problems (absent optional
/// fields, stale version pins, checksum mismatches) never produce this type.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Configuration card could not be read from disk.
    #[error("configuration card not found at {path}")]
    CardNotFound {
        /// Expected card location
        path: PathBuf,
    },

    /// Configuration card is not valid YAML, or not a mapping at top level.
    #[error("failed to parse {path}: {reason}")]
    Parse {
        /// Card being parsed
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },

    /// Lookup of an absent key (callers are expected to validate first).
    #[error("configuration key not found: {0}")]
    KeyNotFound(String),

    /// A key exists but holds a value of the wrong shape.
    #[error("configuration key {key}: expected {expected}, got {actual}")]
    WrongType {
        /// Offending key
        key: String,
        /// Expected value shape
        expected: &'static str,
        /// Actual value shape found
        actual: &'static str,
    },

    /// No estimator backend class was provided.
    #[error("no backend class was provided for the bundle estimator")]
    NoBackendClass,

    /// The backend class is not one this runtime implements.
    #[error("backend class '{0}' is not implemented in this runtime")]
    UnknownBackendClass(String),

    /// A declared library is not linked into this runtime at all.
    #[error("bundle requires library '{0}', which is not available in this runtime")]
    LibraryMissing(String),

    /// No estimator type was defined.
    #[error("no estimator type was defined")]
    NoEstimatorType,

    /// The estimator type is neither classifier nor regressor.
    #[error("estimator type '{0}' was not recognized")]
    UnknownEstimatorType(String),

    /// No information on estimator output was provided.
    #[error("no information on estimator output was provided")]
    OutputMissing,

    /// Output descriptor must be a plain string.
    #[error("estimator output must be defined as a string")]
    OutputNotString,

    /// Classifier card without a classes mapping.
    #[error("no information on estimator classes was provided")]
    ClassesMissing,

    /// Classes must be a mapping from class index to label.
    #[error("estimator classes must be defined as a mapping")]
    ClassesNotMap,

    /// A classes key could not be cast to a non-negative integer.
    #[error("classes mapping key '{0}' is not a non-negative integer")]
    ClassKeyNotInteger(String),

    /// No parameter information was provided.
    #[error("no parameter information was provided")]
    ParametersMissing,

    /// A parameter row does not follow the [name, unit, min, max] format.
    #[error("parameter definition {index} does not follow the [name, unit, min, max] format")]
    ParameterFormat {
        /// 0-indexed offending row
        index: usize,
    },

    /// A parameter range is inverted.
    #[error("parameter '{name}' has min {min} greater than max {max}")]
    ParameterRange {
        /// Parameter name
        name: String,
        /// Declared minimum
        min: f64,
        /// Declared maximum
        max: f64,
    },

    /// Calibration was requested but a required piece is missing.
    #[error("no information on calibration {0} was provided, calibration cannot take place")]
    CalibrationMissing(&'static str),

    /// Calibration bins/values must be numeric lists.
    #[error("calibration {0} must be provided as a list of numbers")]
    CalibrationNotList(&'static str),

    /// Calibration bins and values must pair up one to one.
    #[error("number of calibration bins ({bins}) and values ({values}) do not correspond")]
    CalibrationLengthMismatch {
        /// Declared bin count
        bins: usize,
        /// Declared value count
        values: usize,
    },
}

// ============================================================================
// BUNDLE ERROR
// ============================================================================

/// Runtime misuse of a bundle.
#[derive(Debug, Error)]
pub enum BundleError {
    /// Bundle folder does not exist.
    #[error("bundle folder '{0}' could not be found")]
    FolderNotFound(PathBuf),

    /// Builder refused to write into an occupied folder.
    #[error("bundle folder '{0}' already exists; pass overwrite to replace it")]
    FolderExists(PathBuf),

    /// Builder was asked to write a bundle without an estimator.
    #[error("no estimator was provided to the bundle builder")]
    NoEstimator,

    /// File paths were given as input but the bundle defines no file reader.
    #[error("bundle '{0}' has no file reader")]
    NoFileReader(String),

    /// Input record width does not match the declared parameter count.
    #[error("input data should have {expected} parameters ({actual} provided)")]
    ShapeMismatch {
        /// Width declared by the parameters list
        expected: usize,
        /// Width of the provided records
        actual: usize,
    },

    /// Provided data ids do not pair up with the data rows.
    #[error("length of the provided id list ({ids}) has to equal the number of data rows ({rows})")]
    IdCountMismatch {
        /// Number of data rows
        rows: usize,
        /// Number of provided ids
        ids: usize,
    },

    /// Bundle is not in a runnable state and could not self-heal.
    #[error("cannot run bundle '{0}'")]
    NotRunnable(String),

    /// Prediction was requested on an unloaded estimator handle.
    #[error("estimator is not loaded")]
    EstimatorNotLoaded,

    /// The estimator artifact is absent from the bundle folder.
    #[error("estimator artifact not found at {0}")]
    ArtifactMissing(PathBuf),

    /// The estimator artifact exists but could not be decoded.
    #[error("failed to decode estimator artifact {path}: {reason}")]
    ArtifactDecode {
        /// Artifact location
        path: PathBuf,
        /// Decoder diagnostic
        reason: String,
    },

    /// Rows in a record file or batch had inconsistent widths.
    #[error("record {index} has width {actual}, previous records had width {expected}")]
    RaggedRecords {
        /// 0-indexed offending record
        index: usize,
        /// Width established by earlier records
        expected: usize,
        /// Width of the offending record
        actual: usize,
    },

    /// A data or hooks file could not be read or written.
    #[error("bundle io failure at {path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested entry was absent from a sectioned record file.
    #[error("no entry '{key}' in section '{section}' of {path}")]
    RecordEntryMissing {
        /// File being read
        path: PathBuf,
        /// Section name requested
        section: String,
        /// Key requested
        key: String,
    },
}

// ============================================================================
// RESULTS ERROR
// ============================================================================

/// Misuse of a results container.
#[derive(Debug, Error)]
pub enum ResultsError {
    /// A row reference matched neither an index nor a known data id.
    #[error("unknown result reference '{0}'")]
    UnknownReference(String),

    /// Aggregation would overwrite an existing result id.
    #[error("a result with id '{0}' is already stored")]
    DuplicateResult(String),

    /// Id-based lookup on a result without data ids.
    #[error("results carry no data ids; reference rows by index instead")]
    NoDataIds,
}

// ============================================================================
// REGISTRY ERROR
// ============================================================================

/// Registry-level failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Insertion would collide with an already registered bundle id.
    #[error("cannot add bundle with id '{0}', id is already known")]
    DuplicateBundle(String),
}
