//! `modelpack validate` — run the validation pipeline and print the
//! per-step report.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use modelpack_core::bundle::CONFIGURATION_FILE;
use modelpack_core::{BundleConfiguration, ValidationOptions};

/// Arguments for `modelpack validate`.
#[derive(Args)]
pub struct ValidateArgs {
    /// Bundle folder to validate
    pub folder: PathBuf,

    /// Skip the integrity-manifest step
    #[arg(long)]
    pub no_checksums: bool,
}

pub fn run(args: ValidateArgs) -> anyhow::Result<()> {
    let card = args.folder.join(CONFIGURATION_FILE);
    let mut configuration = BundleConfiguration::load(&card)
        .with_context(|| format!("loading {}", card.display()))?;
    let report = configuration
        .validate_with(&ValidationOptions {
            verify_checksums: !args.no_checksums,
        })
        .context("configuration has a fatal problem")?;

    print!("{}", report.render());
    if report.clean() {
        println!("configuration valid");
    } else {
        println!("configuration valid with defaults applied");
    }
    Ok(())
}
