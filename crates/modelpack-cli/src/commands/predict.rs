//! `modelpack predict` — run bundles over data locally.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, ValueEnum};

use modelpack_core::{BundleRegistry, RecordBatch, RemapMode, RunInput};

/// Remap flag accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RemapArg {
    Off,
    On,
    Both,
}

impl From<RemapArg> for RemapMode {
    fn from(arg: RemapArg) -> Self {
        match arg {
            RemapArg::Off => RemapMode::Off,
            RemapArg::On => RemapMode::On,
            RemapArg::Both => RemapMode::Both,
        }
    }
}

/// Arguments for `modelpack predict`.
#[derive(Args)]
pub struct PredictArgs {
    /// Bundle folders to register
    #[arg(required = true)]
    pub folders: Vec<PathBuf>,

    /// Data: a JSON array of rows (e.g. '[[1.0, 2.0]]'), or the path of a
    /// record file to read through the bundles' file readers
    #[arg(long)]
    pub data: String,

    /// Remap behaviour
    #[arg(long, value_enum, default_value = "off")]
    pub remap: RemapArg,

    /// Comma-separated ids for the data rows
    #[arg(long)]
    pub ids: Option<String>,

    /// Load estimators on demand instead of keeping them resident
    #[arg(long)]
    pub dynamic: bool,

    /// Print the CSV rendering instead of the per-result summaries
    #[arg(long)]
    pub csv: bool,
}

pub fn run(args: PredictArgs) -> anyhow::Result<()> {
    let mut registry = BundleRegistry::new(args.dynamic);
    for folder in &args.folders {
        registry
            .add(folder, None)
            .with_context(|| format!("adding bundle {}", folder.display()))?;
    }

    let input: RunInput = if args.data.trim_start().starts_with('[') {
        let rows: Vec<Vec<f64>> =
            serde_json::from_str(&args.data).context("parsing --data as JSON rows")?;
        RecordBatch::from_rows(rows)?.into()
    } else {
        let path = PathBuf::from(&args.data);
        if !path.is_file() {
            bail!("--data is neither a JSON array nor an existing file");
        }
        path.into()
    };

    let data_ids = args
        .ids
        .map(|ids| ids.split(',').map(str::to_string).collect::<Vec<_>>());

    let results = registry.run(input, args.remap.into(), None, data_ids)?;
    if args.csv {
        print!("{}", results.to_csv());
    } else {
        print!("{}", results.summary());
        for result in &results {
            print!("{}", result.summary());
            if let Some(labels) = result.classifications() {
                println!("  labels:      {}", labels.join(", "));
            }
        }
    }
    Ok(())
}
