use std::{collections::BTreeMap, path::Path, time::Duration};

use anyhow::{Context, Error};
use serde::{Deserialize, Serialize};

use crate::error::InvalidInputError;

/// Definition of bosun's full generator configuration.
///
/// Every value the generated vars file used to hardcode lives here, so runs
/// can be varied without touching the renderer. A configuration file only
/// needs to list the fields it overrides.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeneratorConfig {
    /// Name of the Talos cluster.
    pub cluster_name: String,

    /// Port the Kubernetes API listens on.
    pub cluster_endpoint_port: u16,

    /// Install disk used when a node does not specify one.
    pub default_install_disk: String,

    /// Longhorn disk used when a node does not specify one.
    pub default_longhorn_disk: String,

    /// Proxmox node hosting the VMs, used by the cleanup plays.
    pub proxmox_node: String,

    /// CNI handed to Talos. "none" means Cilium is installed separately.
    pub cni_name: String,

    /// Whether workloads may be scheduled on the control plane.
    pub allow_scheduling_on_control_planes: bool,

    /// Talos version.
    pub talos_version: String,

    /// Kubernetes version. Must be compatible with the Talos version.
    pub kubernetes_version: String,

    /// Cilium version.
    pub cilium_version: String,

    /// Seconds to wait for nodes during bring-up.
    pub wait_timeout_nodes: u32,

    /// Seconds to wait for Cilium during bring-up.
    pub wait_timeout_cilium: u32,

    /// DNS zone appended to hostnames when resolving node addresses.
    pub dns_search_domain: String,

    /// Fallback addresses, keyed by a substring of the hostname. Consulted
    /// when DNS yields nothing.
    pub static_addresses: BTreeMap<String, String>,

    /// Seconds before a disk query against a node is abandoned.
    pub disk_probe_timeout_secs: u64,

    /// Seconds before a DNS lookup is abandoned.
    pub resolve_timeout_secs: u64,

    /// Hostname assigned to a bare metal node added by address when the
    /// operator does not name one.
    pub default_baremetal_hostname: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            cluster_name: "homelab-cluster".into(),
            cluster_endpoint_port: 6443,
            default_install_disk: "/dev/sda".into(),
            default_longhorn_disk: "/dev/sdb".into(),
            proxmox_node: "alif".into(),
            cni_name: "none".into(),
            allow_scheduling_on_control_planes: true,
            talos_version: "1.11.5".into(),
            kubernetes_version: "1.34.1".into(),
            cilium_version: "1.16.5".into(),
            wait_timeout_nodes: 600,
            wait_timeout_cilium: 300,
            dns_search_domain: "lab.jamilshaikh.in".into(),
            static_addresses: [
                ("cp-01", "10.20.0.40"),
                ("wk-01", "10.20.0.41"),
                ("wk-02", "10.20.0.42"),
                ("wk-03", "10.20.0.43"),
            ]
            .into_iter()
            .map(|(hostname, address)| (hostname.to_string(), address.to_string()))
            .collect(),
            disk_probe_timeout_secs: 10,
            resolve_timeout_secs: 5,
            default_baremetal_hostname: "talos-wk-04".into(),
        }
    }
}

impl GeneratorConfig {
    pub fn disk_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.disk_probe_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

/// Loads a generator configuration from a YAML file.
pub fn load(path: impl AsRef<Path>) -> Result<GeneratorConfig, Error> {
    let contents = std::fs::read_to_string(path.as_ref()).with_context(|| {
        InvalidInputError::LoadGeneratorConfig {
            path: path.as_ref().display().to_string(),
        }
    })?;

    serde_yaml::from_str(&contents).context(InvalidInputError::ParseGeneratorConfig)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cluster_literals() {
        let config = GeneratorConfig::default();
        assert_eq!(config.cluster_name, "homelab-cluster");
        assert_eq!(config.cluster_endpoint_port, 6443);
        assert_eq!(config.default_install_disk, "/dev/sda");
        assert_eq!(config.default_longhorn_disk, "/dev/sdb");
        assert_eq!(config.talos_version, "1.11.5");
        assert_eq!(config.kubernetes_version, "1.34.1");
        assert_eq!(config.cilium_version, "1.16.5");
        assert_eq!(config.wait_timeout_nodes, 600);
        assert_eq!(config.wait_timeout_cilium, 300);
        assert_eq!(config.disk_probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.resolve_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.static_addresses.get("cp-01").map(String::as_str),
            Some("10.20.0.40")
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: GeneratorConfig = serde_yaml::from_str(indoc::indoc! {
            r#"
            cluster-name: "lab"
            talos-version: "1.12.0"
            "#
        })
        .unwrap();

        assert_eq!(config.cluster_name, "lab");
        assert_eq!(config.talos_version, "1.12.0");
        assert_eq!(config.kubernetes_version, "1.34.1");
        assert_eq!(config.wait_timeout_nodes, 600);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = GeneratorConfig::default();
        let rendered = serde_yaml::to_string(&config).unwrap();
        let reparsed: GeneratorConfig = serde_yaml::from_str(&rendered).unwrap();
        assert_eq!(reparsed, config);
    }
}
