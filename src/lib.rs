use anyhow::Error;
use log::{info, warn};

use bosun_api::config::{self, GeneratorConfig};
use osutils::{dependencies::Dependency, files};

pub mod cli;
mod disks;
mod inventory;
mod preserve;
mod resolve;
mod terraform;

pub use disks::{select_disks, DiskSelection};
pub use inventory::{compose, OverrideRequest};
pub use preserve::extract_baremetal_section;

use cli::Cli;
use resolve::{DnsResolver, TalosctlProber};

pub const BOSUN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runs one generation pass: load facts, evaluate the bare metal
/// precedence, render, and write the vars file.
pub fn run(args: &Cli) -> Result<(), Error> {
    info!("bosun version: {BOSUN_VERSION}");

    let config = match &args.config {
        Some(path) => config::load(path)?,
        None => GeneratorConfig::default(),
    };

    let facts = terraform::load(&args.terraform_json)?;
    let previous = files::read_optional(&args.output)?;

    let request = args.override_request(&config);
    if !matches!(request, OverrideRequest::None) && !Dependency::Talosctl.exists() {
        warn!("talosctl not found on PATH, disk detection will fall back to the preserved section");
    }

    let prober = TalosctlProber::new(&config);
    let resolver = DnsResolver::new(&config);

    let rendered = inventory::compose(
        &facts,
        &request,
        previous.as_deref(),
        &prober,
        &resolver,
        &config,
    );

    files::write_file(&args.output, &rendered)?;

    info!("Generated cluster inventory: {}", args.output.display());
    info!("  Control plane: {}", facts.control_plane.hostname);
    info!("  VM workers: {}", facts.workers.len());
    for worker in &facts.workers {
        info!("    - {}", worker.hostname);
    }

    Ok(())
}
