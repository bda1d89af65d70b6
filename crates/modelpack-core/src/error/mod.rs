//! Error types for modelpack-core.
//!
//! This module defines the central error types used throughout the bundle
//! runtime:
//!
//! - [`ModelpackError`]: top-level unified error for all crate errors
//! - Sub-error types: [`ChecksumError`], [`ConfigurationError`],
//!   [`BundleError`], [`ResultsError`], [`RegistryError`]
//!
//! Library code never panics on bad input; every fallible operation returns
//! [`Result`] and propagates with `?`. Advisory conditions (checksum
//! mismatches, defaulted configuration fields) are *not* errors — they are
//! logged and folded into the validation report instead.

mod sub_errors;
mod unified;

#[cfg(test)]
mod tests;

pub use sub_errors::{
    BundleError, ChecksumError, ConfigurationError, RegistryError, ResultsError,
};
pub use unified::ModelpackError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ModelpackError>;
