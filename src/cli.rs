use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use bosun_api::config::GeneratorConfig;
use bosun_api::constants::{CLUSTER_VARS_PATH_DEFAULT, TERRAFORM_INVENTORY_PATH_DEFAULT};

use crate::inventory::OverrideRequest;
use crate::BOSUN_VERSION;

/// Generate the Ansible vars file for the Talos cluster from Terraform
/// outputs.
///
/// Terraform is the single source of truth for VM nodes; the bare metal
/// section of the vars file is manually maintained and preserved across
/// runs unless a detection flag asks for it to be regenerated.
#[derive(Parser, Debug)]
#[clap(version = BOSUN_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    /// Path of the Terraform output snapshot
    #[clap(long, default_value = TERRAFORM_INVENTORY_PATH_DEFAULT)]
    pub terraform_json: PathBuf,

    /// Path of the generated vars file
    #[clap(short, long, default_value = CLUSTER_VARS_PATH_DEFAULT)]
    pub output: PathBuf,

    /// Path of a generator configuration file overriding the defaults
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Re-detect disks on the bare metal node already recorded in the vars
    /// file
    #[clap(long)]
    pub detect_baremetal_disks: bool,

    /// Address of a bare metal node to add or update with disk
    /// auto-detection
    #[clap(long)]
    pub baremetal_ip: Option<String>,

    /// Hostname for the bare metal node
    #[clap(long)]
    pub baremetal_hostname: Option<String>,
}

impl Cli {
    /// An explicit address wins over a refresh of the recorded node; with
    /// neither flag the bare metal section is left alone.
    pub fn override_request(&self, config: &GeneratorConfig) -> OverrideRequest {
        if let Some(ip) = &self.baremetal_ip {
            OverrideRequest::ForceDetect {
                ip: ip.clone(),
                hostname: self
                    .baremetal_hostname
                    .clone()
                    .unwrap_or_else(|| config.default_baremetal_hostname.clone()),
            }
        } else if self.detect_baremetal_disks {
            OverrideRequest::RefreshExisting
        } else {
            OverrideRequest::None
        }
    }
}
