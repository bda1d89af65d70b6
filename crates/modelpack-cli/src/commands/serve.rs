//! `modelpack serve` — expose a registry over the TCP predict protocol.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::info;

use modelpack_core::BundleRegistry;
use modelpack_remote::BundleServer;

/// Arguments for `modelpack serve`.
#[derive(Args)]
pub struct ServeArgs {
    /// Bundle folders to serve
    #[arg(required = true)]
    pub folders: Vec<PathBuf>,

    /// Address to listen on (port must be at least 1025)
    #[arg(long, default_value = "127.0.0.1:1992")]
    pub addr: String,

    /// Load estimators on demand instead of keeping them resident
    #[arg(long)]
    pub dynamic: bool,
}

pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    let mut registry = BundleRegistry::new(args.dynamic);
    for folder in &args.folders {
        let id = registry
            .add(folder, None)
            .with_context(|| format!("adding bundle {}", folder.display()))?;
        info!(id = %id, "serving bundle");
    }

    let server = BundleServer::new(Arc::new(registry));
    info!(addr = %args.addr, "starting server; stop with ctrl-c");
    server
        .serve(&args.addr)
        .with_context(|| format!("serving on {}", args.addr))?;
    Ok(())
}
