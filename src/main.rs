//! WolfMesh — WireGuard mesh site configuration generator
//!
//! One-shot batch run: load the site YAML, fill in missing tunnel addresses,
//! keypairs and pairwise preshared keys, write the completed site back, then
//! render per-host systemd-networkd descriptor files.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use wolfmesh::complete::complete;
use wolfmesh::emit;
use wolfmesh::error::Result;
use wolfmesh::site::SiteConfig;

#[derive(Parser)]
#[command(
    name = "wolfmesh",
    version,
    about = "WolfMesh — WireGuard mesh site configuration generator"
)]
struct Cli {
    /// Site configuration YAML file
    #[arg(short, long)]
    file: PathBuf,

    /// Output directory for per-host descriptor files
    #[arg(short, long)]
    output: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut site = SiteConfig::load(&cli.file)?;
    info!(
        "loaded site config with {} hosts from {:?}",
        site.hosts.len(),
        cli.file
    );

    complete(&mut site)?;

    // The site file is the durable record of assignments; persist it before
    // any descriptor is rendered.
    site.save(&cli.file)?;

    emit::write_all(&site, &cli.output)?;
    Ok(())
}
