//! Reader for sectioned record files.
//!
//! The on-disk format is a plain text file of named sections, each holding
//! `key value` lines:
//!
//! ```text
//! # comment
//! [MASS]
//! m0     125.0
//! m12    600.0
//!
//! [COUPLING]
//! tanb   10.0
//! ```
//!
//! Section names are matched case-insensitively; keys case-sensitively. A
//! selector list `[(section, key), ...]` extracts one numeric value per
//! selector, producing a fixed-width record in selector order.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BundleError, Result};

/// One `(section, key)` extraction target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSelector {
    /// Section name (case-insensitive match).
    pub section: String,
    /// Key within the section.
    pub key: String,
}

impl RecordSelector {
    /// Convenience constructor.
    #[must_use]
    pub fn new(section: impl Into<String>, key: impl Into<String>) -> Self {
        RecordSelector {
            section: section.into(),
            key: key.into(),
        }
    }
}

/// Parse a sectioned record file and extract one value per selector.
///
/// # Errors
///
/// `BundleError::Io` when the file cannot be read,
/// `BundleError::RecordEntryMissing` when a selector matches nothing or the
/// matched value is not numeric.
pub fn read_record_file(path: impl AsRef<Path>, selectors: &[RecordSelector]) -> Result<Vec<f64>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| BundleError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    // section (uppercased) -> key -> value
    let mut sections: HashMap<String, HashMap<String, f64>> = HashMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_uppercase();
            sections.entry(name.clone()).or_default();
            current = Some(name);
            continue;
        }
        let Some(section) = &current else {
            continue; // values before any section header carry no address
        };
        let mut words = line.split_whitespace();
        if let (Some(key), Some(value)) = (words.next(), words.next()) {
            if let Ok(value) = value.parse::<f64>() {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.to_string(), value);
            }
        }
    }

    let mut record = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let value = sections
            .get(&selector.section.to_uppercase())
            .and_then(|entries| entries.get(&selector.key))
            .copied()
            .ok_or_else(|| BundleError::RecordEntryMissing {
                path: path.to_path_buf(),
                section: selector.section.clone(),
                key: selector.key.clone(),
            })?;
        record.push(value);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const SAMPLE: &str = "\
# sample spectrum
[MASS]
m0     125.0
m12    600.0

[coupling]
tanb   10.0   # trailing comment
";

    #[test]
    fn extracts_values_in_selector_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("point.dat");
        fs::write(&path, SAMPLE).unwrap();

        let record = read_record_file(
            &path,
            &[
                RecordSelector::new("COUPLING", "tanb"),
                RecordSelector::new("mass", "m0"),
            ],
        )
        .unwrap();
        assert_eq!(record, vec![10.0, 125.0]);
    }

    #[test]
    fn missing_entry_names_section_and_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("point.dat");
        fs::write(&path, SAMPLE).unwrap();

        let err = read_record_file(&path, &[RecordSelector::new("MASS", "m999")]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("m999") && msg.contains("MASS"), "{msg}");
    }
}
