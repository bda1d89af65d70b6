//! modelpack core library.
//!
//! Packages a trained estimator together with a declarative configuration
//! card into a self-describing, integrity-checked folder (a *bundle*), and
//! provides the runtime that loads bundles, validates and normalizes their
//! configuration, and serves predictions.
//!
//! # Architecture
//!
//! This crate defines:
//! - Content digests and the bundle integrity manifest ([`checksum`])
//! - The dotted-key configuration document ([`document`])
//! - The configuration validation pipeline ([`validation`]) — the component
//!   the rest of the runtime trusts: after it runs, every field is present,
//!   normalized and internally consistent
//! - Estimator backends behind a uniform handle ([`estimator`])
//! - The bundle lifecycle and run path ([`bundle`])
//! - The bundle registry with its static/dynamic memory policy ([`registry`])
//! - Result containers ([`results`]) and the bundle builder ([`builder`])
//!
//! # Example
//!
//! ```no_run
//! use modelpack_core::{BundleRegistry, RecordBatch, RemapMode};
//!
//! # fn main() -> modelpack_core::Result<()> {
//! let mut registry = BundleRegistry::new(true);
//! registry.add("bundles/susy-limits", None)?;
//!
//! let data = RecordBatch::from_rows(vec![vec![120.0, 550.0]])?;
//! let results = registry.run(data.into(), RemapMode::Off, None, None)?;
//! for result in &results {
//!     println!("{}", result.summary());
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod bundle;
pub mod checksum;
pub mod document;
pub mod error;
pub mod estimator;
pub mod hooks;
pub mod registry;
pub mod results;
pub mod tabular;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use builder::BundleBuilder;
pub use bundle::{Bundle, RunInput};
pub use checksum::{checksum_dir, checksum_file, ChecksumManifest, Digest};
pub use document::{ConfigurationDocument, DocValue};
pub use error::{ModelpackError, Result};
pub use estimator::{BackendKind, EstimatorHandle, LinearModel};
pub use hooks::HookSet;
pub use registry::{BundleRegistry, RemapMode};
pub use results::{BundleResult, RegistryResult};
pub use types::{EstimatorType, ParameterSpec, RecordBatch};
pub use validation::{
    BundleConfiguration, FileReaderMode, MappingMode, StepOutcome, ValidationOptions,
    ValidationReport,
};
