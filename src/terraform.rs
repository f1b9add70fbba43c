use std::{collections::BTreeMap, path::Path};

use anyhow::{bail, Context, Error};
use log::warn;
use serde::Deserialize;

use bosun_api::error::InvalidInputError;

/// One VM node derived from the Terraform output. Addresses are resolved
/// later; Terraform only knows names and resource ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub hostname: String,
    pub vmid: u32,
}

/// Parsed provisioning facts: the control plane node plus the VM workers,
/// sorted by hostname for stable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningFacts {
    pub control_plane: Node,
    pub workers: Vec<Node>,
}

// Raw shape of the Terraform output snapshot. Every output value sits
// under a "value" wrapper.
#[derive(Deserialize, Default)]
struct RawOutput {
    #[serde(default)]
    controlplane_vms: RawValue,
    #[serde(default)]
    worker_vms: RawValue,
}

#[derive(Deserialize, Default)]
struct RawValue {
    #[serde(default)]
    value: BTreeMap<String, RawVm>,
}

#[derive(Deserialize)]
struct RawVm {
    id: String,
}

/// Loads provisioning facts from the Terraform output snapshot at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<ProvisioningFacts, Error> {
    let contents = std::fs::read_to_string(path.as_ref()).with_context(|| {
        InvalidInputError::LoadTerraformInventory {
            path: path.as_ref().display().to_string(),
        }
    })?;

    parse_facts(&contents)
}

pub fn parse_facts(contents: &str) -> Result<ProvisioningFacts, Error> {
    let raw: RawOutput =
        serde_json::from_str(contents).context(InvalidInputError::ParseTerraformInventory)?;

    // BTreeMap iteration is sorted by hostname, which makes both the
    // control plane pick and the worker order deterministic
    let mut control_planes = raw.controlplane_vms.value.into_iter();
    let control_plane = match control_planes.next() {
        Some((hostname, vm)) => to_node(hostname, &vm)?,
        None => bail!(InvalidInputError::NoControlPlane),
    };
    if control_planes.next().is_some() {
        warn!(
            "Multiple control plane VMs found, using '{}'",
            control_plane.hostname
        );
    }

    let workers = raw
        .worker_vms
        .value
        .into_iter()
        .map(|(hostname, vm)| to_node(hostname, &vm))
        .collect::<Result<Vec<_>, Error>>()?;

    Ok(ProvisioningFacts {
        control_plane,
        workers,
    })
}

// The resource id is a path like "alif/qemu/106"; the trailing segment is
// the numeric VM id.
fn to_node(hostname: String, vm: &RawVm) -> Result<Node, Error> {
    let vmid = vm
        .id
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<u32>().ok())
        .ok_or_else(|| InvalidInputError::MalformedResourceId {
            node: hostname.clone(),
            id: vm.id.clone(),
        })?;

    Ok(Node { hostname, vmid })
}
