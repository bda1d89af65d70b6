//! Registry of bundles with a shared memory policy.
//!
//! A registry owns zero or more bundles, uniqueness enforced on id at
//! insertion time, and fans a single prediction request out to a subset of
//! them. Two memory policies exist: *static* keeps every estimator resident
//! for the registry's lifetime; *dynamic* loads estimators just in time per
//! request and releases them afterwards — slower per call, but bounded in
//! memory when many bundles are registered.

use std::path::Path;

use tracing::{debug, info};

use crate::bundle::{Bundle, RunInput};
use crate::error::{RegistryError, Result};
use crate::results::RegistryResult;
use crate::validation::MappingMode;

/// Remap behaviour of a registry run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapMode {
    /// Predict on the data as provided.
    Off,
    /// Remap before prediction.
    On,
    /// Query every remap-capable bundle twice: once remapped, once not.
    /// The remapped pass's result id carries a `_remapped` suffix.
    Both,
}

impl From<bool> for RemapMode {
    fn from(on: bool) -> Self {
        if on {
            RemapMode::On
        } else {
            RemapMode::Off
        }
    }
}

/// Suffix appended to the remapped pass's result id in two-pass runs.
const REMAPPED_SUFFIX: &str = "_remapped";

/// Owner of a collection of bundles keyed by unique id.
#[derive(Debug)]
pub struct BundleRegistry {
    bundles: Vec<Bundle>,
    dynamic: bool,
}

impl BundleRegistry {
    /// Create an empty registry.
    ///
    /// With `dynamic` set, estimators are loaded per request and released
    /// afterwards; otherwise every estimator is materialized at insertion
    /// time and kept resident.
    #[must_use]
    pub fn new(dynamic: bool) -> Self {
        info!(
            mode = if dynamic { "dynamic" } else { "static" },
            "bundle registry created"
        );
        BundleRegistry {
            bundles: Vec::new(),
            dynamic,
        }
    }

    /// Whether the registry runs the dynamic memory policy.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Switch memory policy, loading or releasing every estimator to match.
    pub fn set_dynamic(&mut self, dynamic: bool) -> Result<()> {
        self.dynamic = dynamic;
        info!(
            mode = if dynamic { "dynamic" } else { "static" },
            "registry memory policy changed"
        );
        for bundle in &self.bundles {
            if dynamic {
                bundle.release_estimator();
            } else {
                bundle.load_estimator()?;
            }
        }
        Ok(())
    }

    /// Load a bundle from `folder` and register it, returning its id.
    ///
    /// The estimator is materialized eagerly only under the static policy.
    ///
    /// # Errors
    ///
    /// `RegistryError::DuplicateBundle` when the resulting id is already
    /// registered; the registry's bundle set is left unchanged.
    pub fn add(&mut self, folder: impl AsRef<Path>, id: Option<String>) -> Result<String> {
        info!("adding bundle to registry");
        let bundle = Bundle::load(folder, id, !self.dynamic)?;
        if self.get(bundle.id()).is_some() {
            return Err(RegistryError::DuplicateBundle(bundle.id().to_string()).into());
        }
        let id = bundle.id().to_string();
        info!(id = %id, "bundle registered");
        self.bundles.push(bundle);
        Ok(id)
    }

    /// Bundle with the given id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Bundle> {
        self.bundles.iter().find(|b| b.id() == id)
    }

    /// Registered bundle ids, in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.bundles.iter().map(Bundle::id).collect()
    }

    /// Number of registered bundles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Whether the registry holds no bundles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Query registered bundles for predictions on `data`.
    ///
    /// `bundle_ids` filters which bundles are queried (`None` = all). In
    /// [`RemapMode::Both`] every bundle is queried twice — remapped and not
    /// — except bundles whose configuration disables remapping, which are
    /// only queried once, unmapped, with a plain result id.
    pub fn run(
        &self,
        data: RunInput,
        remap: RemapMode,
        bundle_ids: Option<&[String]>,
        data_ids: Option<Vec<String>>,
    ) -> Result<RegistryResult> {
        let passes: &[bool] = match remap {
            RemapMode::Both => &[true, false],
            RemapMode::On => &[true],
            RemapMode::Off => &[false],
        };
        info!(passes = passes.len(), "running registry");

        let mut results = RegistryResult::new();
        for bundle in &self.bundles {
            if let Some(wanted) = bundle_ids {
                if !wanted.iter().any(|id| id == bundle.id()) {
                    continue;
                }
            }

            // Under the dynamic policy, load once around all passes and
            // release afterwards; each `run` then sees a warm estimator and
            // leaves residency to us.
            let was_loaded = bundle.is_estimator_loaded();
            if self.dynamic && !was_loaded {
                debug!(id = %bundle.id(), "loading estimator dynamically");
                bundle.load_estimator()?;
            }

            for &pass_remap in passes {
                if pass_remap
                    && passes.len() > 1
                    && bundle.configuration().mapping() == MappingMode::Disabled
                {
                    debug!(id = %bundle.id(), "bundle does not allow remapping; skipping remapped pass");
                    continue;
                }
                info!(id = %bundle.id(), remap = pass_remap, "querying bundle");
                let mut result = bundle.run(data.clone(), pass_remap, data_ids.clone())?;
                if passes.len() > 1 && pass_remap {
                    result.set_id(format!("{}{REMAPPED_SUFFIX}", bundle.id()));
                }
                results.add(result)?;
            }

            if self.dynamic && !was_loaded {
                debug!(id = %bundle.id(), "releasing estimator");
                bundle.release_estimator();
            }
        }
        info!(results = results.len(), "registry run finished");
        Ok(results)
    }
}
