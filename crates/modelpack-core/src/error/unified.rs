//! Top-level unified error type for the modelpack runtime.

use thiserror::Error;

use super::sub_errors::{
    BundleError, ChecksumError, ConfigurationError, RegistryError, ResultsError,
};

/// Top-level unified error type for the modelpack runtime.
///
/// All crate errors convert into this type via `From` implementations, so
/// callers that do not care about the failure domain can hold a single
/// error type while the domain stays recoverable through matching.
///
/// Propagation policy: fatal configuration problems raise immediately and
/// propagate uncaught — there is no retry. The server front end is the only
/// place these are caught generically and turned into structured error
/// responses.
#[derive(Debug, Error)]
pub enum ModelpackError {
    /// Integrity digest computation failed on a direct request.
    #[error("checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    /// Fatal configuration-card violation; the validation pipeline aborted.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Runtime misuse of a bundle.
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),

    /// Misuse of a results container.
    #[error("results error: {0}")]
    Results(#[from] ResultsError),

    /// Registry-level failure.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl ModelpackError {
    /// Short stable identifier for the failure domain, used by the remote
    /// front end to tag structured error responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Checksum(_) => "checksum",
            Self::Configuration(_) => "configuration",
            Self::Bundle(_) => "bundle",
            Self::Results(_) => "results",
            Self::Registry(_) => "registry",
        }
    }
}
