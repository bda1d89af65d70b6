//! Content digests and the bundle integrity manifest.
//!
//! Individual files are digested with a streaming CRC-32 (chunk order
//! matters); directories are digested by *summing* the raw per-file values,
//! which makes the directory digest invariant under file renaming and
//! ordering but sensitive to any single byte change in any file. Digests are
//! rendered as zero-padded 9-digit lower-hex strings, masked to 36 bits.
//!
//! Integrity checking is advisory: a file that is absent during directory
//! aggregation contributes zero rather than erroring. Only a direct
//! [`checksum_file`] request on a nonexistent path fails.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChecksumError, Result};
use crate::estimator::{ARTIFACT_BINARY, ARTIFACT_JSON};

/// File name of the stored integrity manifest inside a bundle folder.
pub const MANIFEST_FILE: &str = "checksums.sfv";

/// Manifest entry name for the estimator artifact.
pub const ENTRY_ESTIMATOR: &str = "estimator";
/// Manifest entry name for the configuration card.
pub const ENTRY_CONFIGURATION: &str = "configuration.yaml";
/// Manifest entry name for the hooks file.
pub const ENTRY_FUNCTIONS: &str = "functions.yaml";
/// Manifest entry name for the whole-folder digest.
pub const ENTRY_TOTAL: &str = "total";

/// Column width of the name field in a stored manifest line.
const MANIFEST_NAME_WIDTH: usize = 24;

/// Read buffer size for streaming file digests.
const CHUNK_SIZE: usize = 64 * 1024;

/// Hex width of a rendered digest.
const DIGEST_WIDTH: usize = 9;

/// Mask applied before rendering; keeps the padded width meaningful even
/// though the underlying accumulator is 32-bit (directory digests are sums
/// and may exceed 32 bits before masking).
const DIGEST_MASK: u64 = 0xF_FFFF_FFFF;

// ============================================================================
// DIGEST
// ============================================================================

/// A rendered content digest: 9 lower-hex digits, zero padded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Render a raw accumulator value.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Digest(format!("{:0width$x}", raw & DIGEST_MASK, width = DIGEST_WIDTH))
    }

    /// Parse a stored digest string. Any string is accepted; comparison
    /// against recomputed digests is what decides validity.
    #[must_use]
    pub fn from_stored(s: &str) -> Self {
        Digest(s.to_string())
    }

    /// The digest as a hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The all-zero digest of empty or absent content.
    #[must_use]
    pub fn zero() -> Self {
        Digest::from_raw(0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// FILE AND DIRECTORY DIGESTS
// ============================================================================

/// Raw streaming CRC-32 of a file. A missing file contributes zero.
fn file_crc(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let mut file = File::open(path).map_err(|source| ChecksumError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(u64::from(hasher.finalize()))
}

/// Streaming CRC-32 digest of a single file.
///
/// # Errors
///
/// `ChecksumError::Missing` if `path` does not exist; this is the one place
/// absence is an error, because the caller asked for this file explicitly.
pub fn checksum_file(path: impl AsRef<Path>) -> Result<Digest> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ChecksumError::Missing {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(Digest::from_raw(file_crc(path)?))
}

/// Sum of raw per-file digests under `path`, recursively, excluding every
/// file named [`MANIFEST_FILE`]. Missing paths contribute zero.
fn dir_crc(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let mut total: u64 = 0;
    let entries = std::fs::read_dir(path).map_err(|source| ChecksumError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let child = entry.path();
        if child.is_dir() {
            total = total.wrapping_add(dir_crc(&child)?);
        } else if entry.file_name() != MANIFEST_FILE {
            total = total.wrapping_add(file_crc(&child)?);
        }
    }
    Ok(total)
}

/// Order-independent digest of a directory tree.
///
/// The per-file values are summed rather than chained, so renaming or
/// reordering files leaves the digest unchanged while any content change
/// alters it. The stored manifest itself is excluded from the sum.
pub fn checksum_dir(path: impl AsRef<Path>) -> Result<Digest> {
    Ok(Digest::from_raw(dir_crc(path.as_ref())?))
}

// ============================================================================
// MANIFEST
// ============================================================================

/// The stored set of integrity digests for a bundle's key artifacts.
///
/// Always exactly four named entries: `estimator`, `configuration.yaml`,
/// `functions.yaml` and `total`. Created at bundle-build time, read at
/// bundle-load time, compared entry by entry against freshly recomputed
/// digests. Mismatches are advisory, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumManifest {
    entries: Vec<(String, Digest)>,
}

impl ChecksumManifest {
    /// Recompute the four bundle digests from a folder on disk.
    ///
    /// The estimator entry digests whichever of the two known artifact
    /// files exists; if neither does it holds the zero digest.
    pub fn compute(folder: impl AsRef<Path>) -> Result<Self> {
        let folder = folder.as_ref();
        let artifact = if folder.join(ARTIFACT_JSON).is_file() {
            folder.join(ARTIFACT_JSON)
        } else {
            folder.join(ARTIFACT_BINARY)
        };
        debug!(folder = %folder.display(), "computing bundle checksums");
        let entries = vec![
            (ENTRY_ESTIMATOR.to_string(), Digest::from_raw(file_crc(&artifact)?)),
            (
                ENTRY_CONFIGURATION.to_string(),
                Digest::from_raw(file_crc(&folder.join(ENTRY_CONFIGURATION))?),
            ),
            (
                ENTRY_FUNCTIONS.to_string(),
                Digest::from_raw(file_crc(&folder.join(ENTRY_FUNCTIONS))?),
            ),
            (ENTRY_TOTAL.to_string(), checksum_dir(folder)?),
        ];
        Ok(ChecksumManifest { entries })
    }

    /// Parse a stored manifest.
    ///
    /// Line format: entry name left-justified to a fixed column, followed by
    /// the digest. Unknown entry names are kept; the comparison side decides
    /// what to do with them.
    ///
    /// # Errors
    ///
    /// `ChecksumError::Missing` if the manifest file is absent (callers
    /// treat this as an advisory condition), `MalformedManifest` on a line
    /// that does not split into two fields.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ChecksumError::Missing {
                path: path.to_path_buf(),
            }
            .into());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut entries = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut words = line.split_whitespace();
            let (Some(name), Some(digest)) = (words.next(), words.next()) else {
                return Err(ChecksumError::MalformedManifest {
                    path: path.to_path_buf(),
                    line: i + 1,
                }
                .into());
            };
            entries.push((name.to_string(), Digest::from_stored(digest)));
        }
        Ok(ChecksumManifest { entries })
    }

    /// Write the manifest in the stored line format.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = String::new();
        for (name, digest) in &self.entries {
            out.push_str(&format!("{name:<MANIFEST_NAME_WIDTH$}{digest}\n"));
        }
        std::fs::write(path, out).map_err(|source| ChecksumError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Digest stored under `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Digest> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d)
    }

    /// Entry names in stored order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Entry pairs in stored order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Digest)> {
        self.entries.iter().map(|(n, d)| (n.as_str(), d))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn empty_file_digests_to_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();
        assert_eq!(checksum_file(&path).unwrap(), Digest::zero());
        assert_eq!(Digest::zero().as_str(), "000000000");
    }

    #[test]
    fn file_digest_is_deterministic_and_byte_sensitive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, b"some estimator bytes").unwrap();
        let first = checksum_file(&path).unwrap();
        let second = checksum_file(&path).unwrap();
        assert_eq!(first, second);

        fs::write(&path, b"some estimator byteZ").unwrap();
        assert_ne!(checksum_file(&path).unwrap(), first);
    }

    #[test]
    fn missing_file_is_an_error_for_direct_requests() {
        let dir = TempDir::new().unwrap();
        let err = checksum_file(dir.path().join("absent")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ModelpackError::Checksum(ChecksumError::Missing { .. })
        ));
    }

    #[test]
    fn directory_digest_ignores_file_names_but_not_content() {
        let a = TempDir::new().unwrap();
        fs::write(a.path().join("one.txt"), b"alpha").unwrap();
        fs::write(a.path().join("two.txt"), b"beta").unwrap();

        let b = TempDir::new().unwrap();
        fs::write(b.path().join("renamed.txt"), b"alpha").unwrap();
        fs::write(b.path().join("other.txt"), b"beta").unwrap();

        assert_eq!(
            checksum_dir(a.path()).unwrap(),
            checksum_dir(b.path()).unwrap()
        );

        fs::write(b.path().join("other.txt"), b"betb").unwrap();
        assert_ne!(
            checksum_dir(a.path()).unwrap(),
            checksum_dir(b.path()).unwrap()
        );
    }

    #[test]
    fn directory_digest_skips_the_manifest_and_missing_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("payload"), b"payload").unwrap();
        let before = checksum_dir(dir.path()).unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), b"whatever").unwrap();
        assert_eq!(checksum_dir(dir.path()).unwrap(), before);

        // A vanished root aggregates to zero instead of erroring.
        assert_eq!(
            checksum_dir(dir.path().join("ghost")).unwrap(),
            Digest::zero()
        );
    }

    #[test]
    fn manifest_round_trips_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ARTIFACT_JSON), b"{}").unwrap();
        fs::write(dir.path().join(ENTRY_CONFIGURATION), b"type: regressor").unwrap();
        let manifest = ChecksumManifest::compute(dir.path()).unwrap();
        let names: Vec<_> = manifest.names().collect();
        assert_eq!(
            names,
            vec![ENTRY_ESTIMATOR, ENTRY_CONFIGURATION, ENTRY_FUNCTIONS, ENTRY_TOTAL]
        );

        let stored = dir.path().join(MANIFEST_FILE);
        manifest.write(&stored).unwrap();
        let reread = ChecksumManifest::read(&stored).unwrap();
        assert_eq!(reread, manifest);
    }

    #[test]
    fn single_artifact_change_only_moves_its_own_entry_and_total() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ARTIFACT_JSON), b"model-a").unwrap();
        fs::write(dir.path().join(ENTRY_CONFIGURATION), b"type: regressor").unwrap();
        fs::write(dir.path().join(ENTRY_FUNCTIONS), b"map: {}").unwrap();
        let before = ChecksumManifest::compute(dir.path()).unwrap();

        fs::write(dir.path().join(ENTRY_FUNCTIONS), b"map: {x: 1}").unwrap();
        let after = ChecksumManifest::compute(dir.path()).unwrap();

        assert_eq!(before.get(ENTRY_ESTIMATOR), after.get(ENTRY_ESTIMATOR));
        assert_eq!(
            before.get(ENTRY_CONFIGURATION),
            after.get(ENTRY_CONFIGURATION)
        );
        assert_ne!(before.get(ENTRY_FUNCTIONS), after.get(ENTRY_FUNCTIONS));
        assert_ne!(before.get(ENTRY_TOTAL), after.get(ENTRY_TOTAL));
    }
}
