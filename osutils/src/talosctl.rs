use std::time::Duration;

use anyhow::{Context, Error};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{dependencies::Dependency, exe::RunWithDeadline};

/// One disk resource as reported by `talosctl get disks`.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Disk {
    /// Kernel device name, e.g. `sda` or `nvme0n1`.
    pub id: String,
    /// Size in bytes.
    pub size: u64,
    pub readonly: bool,
    /// Bus the disk is attached over, e.g. `sata` or `nvme`. May be empty.
    pub transport: String,
    pub model: String,
}

impl Disk {
    /// Loopback devices never back an install.
    pub fn is_loopback(&self) -> bool {
        self.id.starts_with("loop")
    }
}

// Raw shape of one output line. Talos wraps the interesting fields in
// metadata/spec envelopes; absent fields parse as defaults.
#[derive(Deserialize, Default)]
struct Resource {
    #[serde(default)]
    metadata: Metadata,
    #[serde(default)]
    spec: Spec,
}

#[derive(Deserialize, Default)]
struct Metadata {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize, Default)]
struct Spec {
    #[serde(default)]
    size: u64,
    #[serde(default)]
    readonly: bool,
    #[serde(default)]
    transport: String,
    #[serde(default)]
    model: String,
}

/// Queries the disk inventory of the node at `address`. The node is still
/// in maintenance mode at this point, hence `--insecure`.
pub fn get_disks(address: &str, deadline: Duration) -> Result<Vec<Disk>, Error> {
    let output = Dependency::Talosctl
        .cmd()
        .args(["get", "disks", "-n", address, "--insecure", "-o", "json"])
        .output_within(deadline)
        .with_context(|| format!("Failed to query disks on {address}"))?;

    Ok(parse_disks(&output))
}

/// Each output line is an independent JSON document. A malformed line is
/// skipped rather than failing the whole query.
fn parse_disks(output: &str) -> Vec<Disk> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Resource>(line) {
            Ok(resource) => Some(Disk {
                id: resource.metadata.id,
                size: resource.spec.size,
                readonly: resource.spec.readonly,
                transport: resource.spec.transport,
                model: resource.spec.model,
            }),
            Err(e) => {
                warn!("Skipping malformed disk entry: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_disks() {
        let output = indoc::indoc!(
            r#"
            {"metadata": {"namespace": "runtime", "type": "Disks.block.talos.dev", "id": "nvme0n1"}, "spec": {"size": 512110190592, "readonly": false, "transport": "nvme", "model": "SAMSUNG MZVPV512HDGL-000H1"}}
            {"metadata": {"namespace": "runtime", "type": "Disks.block.talos.dev", "id": "sda"}, "spec": {"size": 2000398934016, "readonly": false, "transport": "sata", "model": "CT2000MX500SSD1"}}
            {"metadata": {"namespace": "runtime", "type": "Disks.block.talos.dev", "id": "loop0"}, "spec": {"size": 4096, "readonly": true}}
            "#
        );

        let disks = parse_disks(output);
        assert_eq!(
            disks,
            vec![
                Disk {
                    id: "nvme0n1".into(),
                    size: 512110190592,
                    readonly: false,
                    transport: "nvme".into(),
                    model: "SAMSUNG MZVPV512HDGL-000H1".into(),
                },
                Disk {
                    id: "sda".into(),
                    size: 2000398934016,
                    readonly: false,
                    transport: "sata".into(),
                    model: "CT2000MX500SSD1".into(),
                },
                Disk {
                    id: "loop0".into(),
                    size: 4096,
                    readonly: true,
                    transport: "".into(),
                    model: "".into(),
                },
            ]
        );
        assert!(disks[2].is_loopback());
        assert!(!disks[0].is_loopback());
    }

    #[test]
    fn test_parse_disks_skips_malformed_lines() {
        let output = indoc::indoc!(
            r#"
            {"metadata": {"id": "sda"}, "spec": {"size": 2000398934016}}
            this line is not json
            {"metadata": {"id": "sdb"}, "spec": {"size": 500107862016}}
            "#
        );

        let disks = parse_disks(output);
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].id, "sda");
        assert_eq!(disks[1].id, "sdb");
    }

    #[test]
    fn test_parse_disks_empty_output() {
        assert!(parse_disks("").is_empty());
        assert!(parse_disks("\n\n").is_empty());
    }
}
