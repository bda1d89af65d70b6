//! `modelpack checksum` — recompute a bundle's integrity digests.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use modelpack_core::builder::write_checksums;
use modelpack_core::checksum::{ChecksumManifest, MANIFEST_FILE};

/// Arguments for `modelpack checksum`.
#[derive(Args)]
pub struct ChecksumArgs {
    /// Bundle folder to digest
    pub folder: PathBuf,

    /// Re-stamp the stored manifest with the recomputed digests
    #[arg(long)]
    pub write: bool,
}

pub fn run(args: ChecksumArgs) -> anyhow::Result<()> {
    let computed = ChecksumManifest::compute(&args.folder)
        .with_context(|| format!("digesting {}", args.folder.display()))?;
    let stored = ChecksumManifest::read(args.folder.join(MANIFEST_FILE)).ok();

    for (name, digest) in computed.entries() {
        let verdict = match stored.as_ref().and_then(|m| m.get(name)) {
            Some(stored_digest) if stored_digest == digest => "ok",
            Some(_) => "MISMATCH",
            None => "not stored",
        };
        println!("{name:<24}{digest}  {verdict}");
    }

    if args.write {
        write_checksums(&args.folder).context("re-stamping the manifest")?;
        println!("manifest written to {}", args.folder.join(MANIFEST_FILE).display());
    }
    Ok(())
}
