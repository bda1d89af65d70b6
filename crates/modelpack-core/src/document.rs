//! Generic configuration document: a flat map from dotted string keys to
//! heterogeneous YAML values.
//!
//! Keys are logically namespaced by `.` but stored exactly as authored —
//! `classifier.calibrated` is a literal key, not a nested lookup. The
//! document is mutated in memory by the validation pipeline; nothing is
//! written back to the source file unless [`ConfigurationDocument::save`] is
//! called explicitly.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};

/// Value type held by a configuration document.
pub type DocValue = serde_yaml::Value;

/// Human-readable shape name of a YAML value, for error messages.
#[must_use]
pub fn value_shape(value: &DocValue) -> &'static str {
    match value {
        DocValue::Null => "null",
        DocValue::Bool(_) => "bool",
        DocValue::Number(_) => "number",
        DocValue::String(_) => "string",
        DocValue::Sequence(_) => "list",
        DocValue::Mapping(_) => "mapping",
        DocValue::Tagged(_) => "tagged value",
    }
}

/// A key/value configuration store loaded from a YAML card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    values: BTreeMap<String, DocValue>,
    path: Option<PathBuf>,
    folder: Option<PathBuf>,
}

impl ConfigurationDocument {
    /// An empty document with no source location.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from in-memory entries (no source location).
    #[must_use]
    pub fn from_entries(entries: BTreeMap<String, DocValue>) -> Self {
        ConfigurationDocument {
            values: entries,
            path: None,
            folder: None,
        }
    }

    /// Parse a YAML card from disk.
    ///
    /// The parent directory of `path` is remembered as the document's
    /// folder so that relative lookups (hooks file, stored manifest) can be
    /// resolved later.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::CardNotFound` if `path` is not a file,
    /// `ConfigurationError::Parse` if the content is not a YAML mapping.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigurationError::CardNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let parsed: DocValue =
            serde_yaml::from_str(&text).map_err(|e| ConfigurationError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let DocValue::Mapping(mapping) = parsed else {
            return Err(ConfigurationError::Parse {
                path: path.to_path_buf(),
                reason: format!("expected a mapping at top level, got {}", value_shape(&parsed)),
            }
            .into());
        };
        let mut values = BTreeMap::new();
        for (key, value) in mapping {
            let key = match key {
                DocValue::String(s) => s,
                other => serde_yaml::to_string(&other)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            };
            values.insert(key, value);
        }
        Ok(ConfigurationDocument {
            values,
            folder: path.parent().map(Path::to_path_buf),
            path: Some(path.to_path_buf()),
        })
    }

    /// Source file of this document, if it was loaded from disk.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Folder containing the source file, if known.
    #[must_use]
    pub fn folder(&self) -> Option<&Path> {
        self.folder.as_deref()
    }

    /// Override the folder used for relative lookups.
    pub fn set_folder(&mut self, folder: impl Into<PathBuf>) {
        self.folder = Some(folder.into());
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value at `key`.
    ///
    /// # Errors
    ///
    /// `ConfigurationError::KeyNotFound` if absent. Callers are expected to
    /// run the validation pipeline first, which guarantees presence of every
    /// field it owns.
    pub fn get(&self, key: &str) -> Result<&DocValue> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigurationError::KeyNotFound(key.to_string()).into())
    }

    /// Value at `key`, or `None` if absent.
    #[must_use]
    pub fn get_opt(&self, key: &str) -> Option<&DocValue> {
        self.values.get(key)
    }

    /// String value at `key`.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            DocValue::String(s) => Ok(s),
            other => Err(self.wrong_type(key, "string", other)),
        }
    }

    /// Boolean value at `key`.
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            DocValue::Bool(b) => Ok(*b),
            other => Err(self.wrong_type(key, "bool", other)),
        }
    }

    /// Integer value at `key`.
    pub fn get_i64(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            DocValue::Number(n) if n.as_i64().is_some() => Ok(n.as_i64().unwrap_or_default()),
            other => Err(self.wrong_type(key, "integer", other)),
        }
    }

    /// Float value at `key` (integers widen).
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        match self.get(key)? {
            DocValue::Number(n) if n.as_f64().is_some() => Ok(n.as_f64().unwrap_or_default()),
            other => Err(self.wrong_type(key, "number", other)),
        }
    }

    /// List value at `key`.
    pub fn get_list(&self, key: &str) -> Result<&Vec<DocValue>> {
        match self.get(key)? {
            DocValue::Sequence(seq) => Ok(seq),
            other => Err(self.wrong_type(key, "list", other)),
        }
    }

    /// Mapping value at `key`.
    pub fn get_map(&self, key: &str) -> Result<&serde_yaml::Mapping> {
        match self.get(key)? {
            DocValue::Mapping(map) => Ok(map),
            other => Err(self.wrong_type(key, "mapping", other)),
        }
    }

    fn wrong_type(
        &self,
        key: &str,
        expected: &'static str,
        actual: &DocValue,
    ) -> crate::error::ModelpackError {
        ConfigurationError::WrongType {
            key: key.to_string(),
            expected,
            actual: value_shape(actual),
        }
        .into()
    }

    /// Unconditional insert/overwrite.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DocValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<DocValue> {
        self.values.remove(key)
    }

    /// All entries, sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &DocValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the document holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Deterministic, human-scannable dump: one line per key, sorted, with
    /// lists longer than five elements abbreviated. A debugging aid, not
    /// load-bearing.
    #[must_use]
    pub fn render(&self) -> String {
        let width = self
            .values
            .keys()
            .map(String::len)
            .max()
            .unwrap_or(0)
            + 6;
        let mut out = String::new();
        for (key, value) in &self.values {
            let _ = writeln!(out, "{key:<width$}{}", render_value(value));
        }
        out
    }

    /// Write the document back to disk as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut mapping = serde_yaml::Mapping::new();
        for (key, value) in &self.values {
            mapping.insert(DocValue::String(key.clone()), value.clone());
        }
        let text =
            serde_yaml::to_string(&DocValue::Mapping(mapping)).map_err(|e| {
                ConfigurationError::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;
        std::fs::write(path, text).map_err(|source| crate::error::BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

fn render_scalar(value: &DocValue) -> String {
    match value {
        DocValue::Null => "null".to_string(),
        DocValue::Bool(b) => b.to_string(),
        DocValue::Number(n) => n.to_string(),
        DocValue::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim()
            .to_string(),
    }
}

fn render_value(value: &DocValue) -> String {
    match value {
        DocValue::Sequence(seq) if seq.len() > 5 => {
            format!(
                "list of length {}: [{}, {}, ... {}, {}]",
                seq.len(),
                render_scalar(&seq[0]),
                render_scalar(&seq[1]),
                render_scalar(&seq[seq.len() - 2]),
                render_scalar(&seq[seq.len() - 1]),
            )
        }
        DocValue::Sequence(seq) => {
            let items: Vec<String> = seq.iter().map(render_scalar).collect();
            format!("list of length {}: [{}]", seq.len(), items.join(", "))
        }
        DocValue::Mapping(map) => format!("mapping of {} entries", map.len()),
        other => render_scalar(other),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn card(dir: &TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("configuration.yaml");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn load_keeps_dotted_keys_flat_and_remembers_the_folder() {
        let dir = TempDir::new().unwrap();
        let path = card(
            &dir,
            "type: classifier\nclassifier.calibrated: false\nmapping: 0.1\n",
        );
        let doc = ConfigurationDocument::load(&path).unwrap();
        assert_eq!(doc.get_str("type").unwrap(), "classifier");
        assert!(!doc.get_bool("classifier.calibrated").unwrap());
        assert_eq!(doc.folder(), Some(dir.path()));
    }

    #[test]
    fn get_on_absent_key_is_key_not_found() {
        let doc = ConfigurationDocument::new();
        let err = doc.get("output").unwrap_err();
        assert!(err.to_string().contains("output"));
    }

    #[test]
    fn typed_getter_reports_expected_and_actual_shape() {
        let mut doc = ConfigurationDocument::new();
        doc.set("mapping", DocValue::from(0.05));
        let err = doc.get_str("mapping").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("string") && msg.contains("number"), "{msg}");
    }

    #[test]
    fn set_overwrites_in_place() {
        let mut doc = ConfigurationDocument::new();
        doc.set("class", "JSON");
        doc.set("class", "json");
        assert_eq!(doc.get_str("class").unwrap(), "json");
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn render_is_sorted_and_abbreviates_long_lists() {
        let mut doc = ConfigurationDocument::new();
        doc.set("zeta", true);
        doc.set("alpha", 1);
        doc.set(
            "bins",
            DocValue::Sequence((0..8).map(|i| DocValue::from(i)).collect()),
        );
        let dump = doc.render();
        let alpha = dump.find("alpha").unwrap();
        let zeta = dump.find("zeta").unwrap();
        assert!(alpha < zeta);
        assert!(dump.contains("list of length 8: [0, 1, ... 6, 7]"), "{dump}");
    }

    #[test]
    fn save_then_load_round_trips_entries() {
        let dir = TempDir::new().unwrap();
        let mut doc = ConfigurationDocument::new();
        doc.set("type", "regressor");
        doc.set("bundle_version", 3);
        let path = dir.path().join("configuration.yaml");
        doc.save(&path).unwrap();

        let reread = ConfigurationDocument::load(&path).unwrap();
        assert_eq!(reread.get_str("type").unwrap(), "regressor");
        assert_eq!(reread.get_i64("bundle_version").unwrap(), 3);
    }
}
