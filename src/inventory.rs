use std::fmt::Write as _;

use log::{info, warn};

use bosun_api::{config::GeneratorConfig, constants::UNRESOLVED_ADDRESS};

use crate::{
    disks::{select_disks, DiskSelection},
    preserve,
    resolve::{AddressResolver, DiskProber},
    terraform::ProvisioningFacts,
};

/// What the operator asked to happen to the bare metal section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideRequest {
    /// Keep whatever the previous file carried.
    None,
    /// Probe the given address and regenerate the section for it.
    ForceDetect { ip: String, hostname: String },
    /// Probe the address already recorded in the preserved section.
    RefreshExisting,
}

/// Renders the complete vars file.
///
/// The VM sections always reflect the current provisioning facts. The bare
/// metal section follows a first-success precedence: a requested detection,
/// then the preserved section from the previous file, then the commented
/// placeholder. All network access goes through the injected capabilities.
pub fn compose(
    facts: &ProvisioningFacts,
    request: &OverrideRequest,
    previous: Option<&str>,
    prober: &dyn DiskProber,
    resolver: &dyn AddressResolver,
    config: &GeneratorConfig,
) -> String {
    let preserved = previous.and_then(preserve::extract_baremetal_section);
    let cp_ip = resolve_address(resolver, &facts.control_plane.hostname);

    let mut out = String::new();
    render_header(&mut out, &cp_ip, config);
    render_nodes(&mut out, facts, &cp_ip, resolver, config);
    out.push_str(&baremetal_section(
        request,
        preserved.as_deref(),
        prober,
        config,
    ));
    render_trailer(&mut out, config);
    out
}

fn resolve_address(resolver: &dyn AddressResolver, hostname: &str) -> String {
    resolver.resolve(hostname).unwrap_or_else(|| {
        warn!("Could not resolve an address for {hostname}");
        UNRESOLVED_ADDRESS.into()
    })
}

fn render_header(out: &mut String, cp_ip: &str, config: &GeneratorConfig) {
    out.push_str("---\n");
    out.push_str("# Talos Cluster Configuration Variables\n");
    out.push_str("# VM workers are AUTO-GENERATED from Terraform outputs\n");
    out.push_str(
        "# Bare metal workers (baremetal_workers) are manually maintained - DO NOT DELETE\n",
    );
    out.push_str("# Generated by: bosun\n");
    out.push('\n');
    out.push_str("# Cluster configuration\n");
    let _ = writeln!(out, "cluster_name: \"{}\"", config.cluster_name);
    let _ = writeln!(
        out,
        "cluster_endpoint: \"https://{cp_ip}:{}\"  # Control plane IP",
        config.cluster_endpoint_port
    );
    out.push('\n');
    out.push_str("# Default install disk (used if not specified per node)\n");
    let _ = writeln!(
        out,
        "default_install_disk: \"{}\"",
        config.default_install_disk
    );
    out.push('\n');
    out.push_str("# Default Longhorn disk (used for storage on all nodes)\n");
    let _ = writeln!(
        out,
        "default_longhorn_disk: \"{}\"",
        config.default_longhorn_disk
    );
    out.push('\n');
    out.push_str("# Talos node configuration\n");
    out.push_str("# - install_disk: optional, defaults to default_install_disk\n");
    out.push_str("# - longhorn_disk: optional, dedicated disk for Longhorn storage (defaults to default_longhorn_disk)\n");
}

fn render_nodes(
    out: &mut String,
    facts: &ProvisioningFacts,
    cp_ip: &str,
    resolver: &dyn AddressResolver,
    config: &GeneratorConfig,
) {
    let cp = &facts.control_plane;
    out.push_str("talos_nodes:\n");
    out.push_str("  control_plane:\n");
    let _ = writeln!(out, "    hostname: \"{}\"", cp.hostname);
    let _ = writeln!(out, "    ip: \"{cp_ip}\"");
    let _ = writeln!(out, "    vmid: {}", cp.vmid);
    let _ = writeln!(
        out,
        "    longhorn_disk: \"{}\"  # Dedicated disk for Longhorn",
        config.default_longhorn_disk
    );
    out.push_str("  # VM workers (from Terraform)\n");
    out.push_str("  workers:\n");

    for worker in &facts.workers {
        let ip = resolve_address(resolver, &worker.hostname);
        let _ = writeln!(out, "    - hostname: \"{}\"", worker.hostname);
        let _ = writeln!(out, "      ip: \"{ip}\"");
        let _ = writeln!(out, "      vmid: {}", worker.vmid);
        let _ = writeln!(
            out,
            "      longhorn_disk: \"{}\"  # Dedicated disk for Longhorn",
            config.default_longhorn_disk
        );
    }
}

// Which invocation a freshly detected section gets attributed to.
enum DetectionSource {
    ByAddress,
    FromExisting,
}

/// Evaluates the precedence policy for the bare metal section. Every
/// external failure degrades to the next step; only the placeholder has
/// nothing left to fall back to.
fn baremetal_section(
    request: &OverrideRequest,
    preserved: Option<&str>,
    prober: &dyn DiskProber,
    config: &GeneratorConfig,
) -> String {
    match request {
        OverrideRequest::ForceDetect { ip, hostname } => {
            info!("Detecting disks on bare metal node {ip}");
            if let Some(selection) = probe_and_select(prober, ip) {
                return render_detected(
                    ip,
                    hostname,
                    &selection,
                    DetectionSource::ByAddress,
                    config,
                );
            }
            warn!("Could not detect disks, preserving existing config");
        }
        OverrideRequest::RefreshExisting => {
            if let Some(section) = preserved {
                match preserve::find_ip(section) {
                    Some(ip) => {
                        let hostname = preserve::find_hostname(section)
                            .unwrap_or_else(|| config.default_baremetal_hostname.clone());
                        info!("Detecting disks on existing bare metal node {ip}");
                        if let Some(selection) = probe_and_select(prober, &ip) {
                            return render_detected(
                                &ip,
                                &hostname,
                                &selection,
                                DetectionSource::FromExisting,
                                config,
                            );
                        }
                        warn!("Could not detect disks, preserving existing config");
                    }
                    None => warn!("No address found in the preserved bare metal section"),
                }
            }
        }
        OverrideRequest::None => {}
    }

    if let Some(section) = preserved {
        info!("Preserved existing baremetal_workers section");
        format!("\n{section}\n")
    } else {
        placeholder_section()
    }
}

fn probe_and_select(prober: &dyn DiskProber, address: &str) -> Option<DiskSelection> {
    match prober.probe(address) {
        Ok(disks) => {
            let selection = select_disks(&disks);
            if selection.is_none() {
                warn!("No suitable disks found on {address}");
            }
            selection
        }
        Err(e) => {
            warn!("Could not query disks on {address}: {e:#}");
            None
        }
    }
}

fn render_detected(
    ip: &str,
    hostname: &str,
    selection: &DiskSelection,
    source: DetectionSource,
    config: &GeneratorConfig,
) -> String {
    // A node without a second disk falls back to the shared default rather
    // than doubling up on the install disk
    let longhorn_disk = selection
        .longhorn_disk
        .as_deref()
        .unwrap_or(&config.default_longhorn_disk);
    let longhorn_info = selection
        .longhorn_disk_info
        .as_deref()
        .unwrap_or("Defaulted");

    let invocation = match source {
        DetectionSource::ByAddress => format!("bosun --baremetal-ip {ip}"),
        DetectionSource::FromExisting => "bosun --detect-baremetal-disks".to_string(),
    };

    info!("Auto-detected disks for {hostname}:");
    info!(
        "  - Install: {} ({})",
        selection.install_disk, selection.install_disk_info
    );
    info!("  - Longhorn: {longhorn_disk} ({longhorn_info})");

    let mut out = String::new();
    out.push('\n');
    out.push_str("# Bare metal workers (manually maintained - not managed by Terraform)\n");
    let _ = writeln!(out, "# Disks auto-detected via: {invocation}");
    out.push_str("baremetal_workers:\n");
    let _ = writeln!(out, "  - hostname: \"{hostname}\"");
    let _ = writeln!(out, "    ip: \"{ip}\"");
    let _ = writeln!(
        out,
        "    install_disk: \"{}\"   # {}",
        selection.install_disk, selection.install_disk_info
    );
    let _ = writeln!(
        out,
        "    longhorn_disk: \"{longhorn_disk}\"       # {longhorn_info}"
    );
    out
}

// Instructional only; the key stays commented out so regeneration never
// mistakes the template for an operator-maintained section.
fn placeholder_section() -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("# Bare metal workers (manually maintained - not managed by Terraform)\n");
    out.push_str("# Add your bare metal nodes here with custom disk configurations\n");
    out.push_str("# Or use: bosun --baremetal-ip <IP> to auto-detect disks\n");
    out.push_str("# baremetal_workers:\n");
    out.push_str("#   - hostname: \"talos-wk-04\"\n");
    out.push_str("#     ip: \"10.20.0.45\"\n");
    out.push_str("#     install_disk: \"/dev/nvme0n1\"   # NVMe for Talos OS\n");
    out.push_str("#     longhorn_disk: \"/dev/sda\"       # SSD for Longhorn storage\n");
    out
}

fn render_trailer(out: &mut String, config: &GeneratorConfig) {
    out.push('\n');
    out.push_str("# Proxmox configuration (for cleanup)\n");
    let _ = writeln!(
        out,
        "proxmox_node: \"{}\"  # Proxmox node name",
        config.proxmox_node
    );
    out.push('\n');
    out.push_str("# Talos configuration directory (relative to repo root)\n");
    out.push_str("talos_config_dir: \"{{ playbook_dir }}/../../talos-{{ cluster_name }}\"\n");
    out.push('\n');
    out.push_str("# CNI to use (none = we'll install Cilium manually)\n");
    let _ = writeln!(out, "cni_name: \"{}\"", config.cni_name);
    out.push('\n');
    out.push_str("# Allow scheduling on control plane\n");
    let _ = writeln!(
        out,
        "allow_scheduling_on_control_planes: {}",
        config.allow_scheduling_on_control_planes
    );
    out.push('\n');
    out.push_str("# Talos version\n");
    let _ = writeln!(out, "talos_version: \"{}\"", config.talos_version);
    out.push('\n');
    out.push_str("# Kubernetes version (must be compatible with Talos version)\n");
    let _ = writeln!(out, "kubernetes_version: \"{}\"", config.kubernetes_version);
    out.push('\n');
    out.push_str("# Cilium version\n");
    let _ = writeln!(out, "cilium_version: \"{}\"", config.cilium_version);
    out.push('\n');
    out.push_str("# Wait timeouts (in seconds)\n");
    let _ = writeln!(out, "wait_timeout_nodes: {}", config.wait_timeout_nodes);
    let _ = writeln!(out, "wait_timeout_cilium: {}", config.wait_timeout_cilium);
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use osutils::talosctl::Disk;

    use crate::terraform::Node;

    struct TableResolver;

    impl AddressResolver for TableResolver {
        fn resolve(&self, hostname: &str) -> Option<String> {
            match hostname {
                "talos-cp-01" => Some("10.20.0.40".into()),
                "talos-wk-01" => Some("10.20.0.41".into()),
                "talos-wk-02" => Some("10.20.0.42".into()),
                _ => None,
            }
        }
    }

    struct FixedProber(Vec<Disk>);

    impl DiskProber for FixedProber {
        fn probe(&self, _address: &str) -> Result<Vec<Disk>, anyhow::Error> {
            Ok(self.0.clone())
        }
    }

    struct FailingProber;

    impl DiskProber for FailingProber {
        fn probe(&self, address: &str) -> Result<Vec<Disk>, anyhow::Error> {
            Err(anyhow!("no route to {address}"))
        }
    }

    fn facts() -> ProvisioningFacts {
        ProvisioningFacts {
            control_plane: Node {
                hostname: "talos-cp-01".into(),
                vmid: 106,
            },
            workers: vec![
                Node {
                    hostname: "talos-wk-01".into(),
                    vmid: 201,
                },
                Node {
                    hostname: "talos-wk-02".into(),
                    vmid: 202,
                },
            ],
        }
    }

    fn probe_disks() -> Vec<Disk> {
        vec![
            Disk {
                id: "nvme0n1".into(),
                size: 500_000_000_000,
                readonly: false,
                transport: "nvme".into(),
                model: "WD_BLACK SN770".into(),
            },
            Disk {
                id: "sda".into(),
                size: 2_000_000_000_000,
                readonly: false,
                transport: "sata".into(),
                model: "CT2000MX500SSD1".into(),
            },
        ]
    }

    fn compose_with(request: OverrideRequest, previous: Option<&str>) -> String {
        compose(
            &facts(),
            &request,
            previous,
            &FixedProber(probe_disks()),
            &TableResolver,
            &GeneratorConfig::default(),
        )
    }

    #[test]
    fn test_first_run_renders_placeholder() {
        let out = compose_with(OverrideRequest::None, None);

        assert!(out.contains("# baremetal_workers:"));
        assert!(preserve::extract_baremetal_section(&out).is_none());
    }

    #[test]
    fn test_vm_sections_reflect_facts() {
        let out = compose_with(OverrideRequest::None, None);

        assert!(out.contains("cluster_endpoint: \"https://10.20.0.40:6443\""));
        assert!(out.contains("    hostname: \"talos-cp-01\""));
        assert!(out.contains("    vmid: 106"));
        assert!(out.contains("    - hostname: \"talos-wk-01\""));
        assert!(out.contains("      ip: \"10.20.0.42\""));

        // Workers stay in hostname order
        let wk1 = out.find("talos-wk-01").unwrap();
        let wk2 = out.find("talos-wk-02").unwrap();
        assert!(wk1 < wk2);
    }

    #[test]
    fn test_unresolvable_worker_gets_sentinel_address() {
        let mut facts = facts();
        facts.workers.push(Node {
            hostname: "talos-wk-09".into(),
            vmid: 209,
        });

        let out = compose(
            &facts,
            &OverrideRequest::None,
            None,
            &FixedProber(probe_disks()),
            &TableResolver,
            &GeneratorConfig::default(),
        );
        assert!(out.contains("- hostname: \"talos-wk-09\"\n      ip: \"unknown\""));
    }

    #[test]
    fn test_force_detect_renders_fresh_section() {
        let out = compose_with(
            OverrideRequest::ForceDetect {
                ip: "10.20.0.45".into(),
                hostname: "talos-wk-04".into(),
            },
            None,
        );

        let section = preserve::extract_baremetal_section(&out).unwrap();
        assert!(section.contains("- hostname: \"talos-wk-04\""));
        assert!(section.contains("ip: \"10.20.0.45\""));
        assert!(section.contains("install_disk: \"/dev/nvme0n1\""));
        assert!(section.contains("longhorn_disk: \"/dev/sda\""));
    }

    #[test]
    fn test_force_detect_failure_preserves_previous_section() {
        let previous = compose_with(
            OverrideRequest::ForceDetect {
                ip: "10.20.0.45".into(),
                hostname: "talos-wk-04".into(),
            },
            None,
        );
        let kept = preserve::extract_baremetal_section(&previous).unwrap();

        let out = compose(
            &facts(),
            &OverrideRequest::ForceDetect {
                ip: "10.20.0.45".into(),
                hostname: "talos-wk-04".into(),
            },
            Some(&previous),
            &FailingProber,
            &TableResolver,
            &GeneratorConfig::default(),
        );

        assert_eq!(preserve::extract_baremetal_section(&out).unwrap(), kept);
    }

    #[test]
    fn test_force_detect_failure_without_previous_renders_placeholder() {
        let out = compose(
            &facts(),
            &OverrideRequest::ForceDetect {
                ip: "10.20.0.45".into(),
                hostname: "talos-wk-04".into(),
            },
            None,
            &FailingProber,
            &TableResolver,
            &GeneratorConfig::default(),
        );
        assert!(out.contains("# baremetal_workers:"));
    }

    #[test]
    fn test_refresh_existing_probes_preserved_address() {
        let previous = compose_with(
            OverrideRequest::ForceDetect {
                ip: "10.20.0.45".into(),
                hostname: "bm-worker".into(),
            },
            None,
        );

        let out = compose_with(OverrideRequest::RefreshExisting, Some(&previous));

        let section = preserve::extract_baremetal_section(&out).unwrap();
        // The address and hostname come from the preserved section, the
        // disks from the fresh probe
        assert!(section.contains("ip: \"10.20.0.45\""));
        assert!(section.contains("- hostname: \"bm-worker\""));
        assert!(section.contains("--detect-baremetal-disks"));
    }

    #[test]
    fn test_refresh_existing_without_previous_renders_placeholder() {
        let out = compose_with(OverrideRequest::RefreshExisting, None);
        assert!(out.contains("# baremetal_workers:"));
    }

    #[test]
    fn test_preserved_section_round_trips_byte_identical() {
        let mut previous = compose_with(
            OverrideRequest::ForceDetect {
                ip: "10.20.0.45".into(),
                hostname: "talos-wk-04".into(),
            },
            None,
        );
        // Operator edits inside the section must survive verbatim
        previous = previous.replace(
            "    ip: \"10.20.0.45\"\n",
            "    ip: \"10.20.0.45\"\n    # manual note: second PSU flaky\n",
        );
        let original = preserve::extract_baremetal_section(&previous).unwrap();

        let regenerated = compose_with(OverrideRequest::None, Some(&previous));
        let reextracted = preserve::extract_baremetal_section(&regenerated).unwrap();
        assert_eq!(reextracted, original);

        // And again, to prove regeneration has reached a fixed point
        let once_more = compose_with(OverrideRequest::None, Some(&regenerated));
        assert_eq!(
            preserve::extract_baremetal_section(&once_more).unwrap(),
            original
        );
    }

    #[test]
    fn test_trailer_reflects_config() {
        let mut config = GeneratorConfig::default();
        config.cluster_name = "edge-cluster".into();
        config.talos_version = "1.12.0".into();
        config.wait_timeout_nodes = 120;

        let out = compose(
            &facts(),
            &OverrideRequest::None,
            None,
            &FixedProber(probe_disks()),
            &TableResolver,
            &config,
        );

        assert!(out.contains("cluster_name: \"edge-cluster\""));
        assert!(out.contains("talos_version: \"1.12.0\""));
        assert!(out.contains("wait_timeout_nodes: 120"));
        assert!(out.contains("talos_config_dir: \"{{ playbook_dir }}/../../talos-{{ cluster_name }}\""));
    }

    #[test]
    fn test_detection_without_second_disk_uses_default_longhorn() {
        let single = vec![Disk {
            id: "nvme0n1".into(),
            size: 500_000_000_000,
            readonly: false,
            transport: "nvme".into(),
            model: "WD_BLACK SN770".into(),
        }];

        let out = compose(
            &facts(),
            &OverrideRequest::ForceDetect {
                ip: "10.20.0.45".into(),
                hostname: "talos-wk-04".into(),
            },
            None,
            &FixedProber(single),
            &TableResolver,
            &GeneratorConfig::default(),
        );

        let section = preserve::extract_baremetal_section(&out).unwrap();
        assert!(section.contains("longhorn_disk: \"/dev/sdb\""));
    }
}
