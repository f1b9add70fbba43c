use std::{collections::BTreeMap, time::Duration};

use anyhow::Error;
use log::warn;

use bosun_api::config::GeneratorConfig;
use osutils::{dig, talosctl, talosctl::Disk};

/// Resolves a node hostname to a network address.
pub trait AddressResolver {
    fn resolve(&self, hostname: &str) -> Option<String>;
}

/// Queries a node for its disk inventory.
pub trait DiskProber {
    fn probe(&self, address: &str) -> Result<Vec<Disk>, Error>;
}

/// DNS-backed resolver with the configured static table as fallback. DHCP
/// reservations are expected to be mirrored into the lab zone, so a lookup
/// of `{hostname}.{search-domain}` is tried first.
pub struct DnsResolver {
    search_domain: String,
    deadline: Duration,
    static_addresses: BTreeMap<String, String>,
}

impl DnsResolver {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            search_domain: config.dns_search_domain.clone(),
            deadline: config.resolve_timeout(),
            static_addresses: config.static_addresses.clone(),
        }
    }
}

impl AddressResolver for DnsResolver {
    fn resolve(&self, hostname: &str) -> Option<String> {
        let fqdn = format!("{hostname}.{}", self.search_domain);
        match dig::short(&fqdn, self.deadline) {
            Ok(Some(address)) => return Some(address),
            Ok(None) => {}
            Err(e) => warn!("Could not resolve {fqdn}: {e:#}"),
        }

        // Static table entries are keyed by hostname fragments, e.g. a
        // "wk-01" entry covers "talos-wk-01"
        self.static_addresses
            .iter()
            .find(|(fragment, _)| hostname.contains(fragment.as_str()))
            .map(|(_, address)| address.clone())
    }
}

/// talosctl-backed disk prober.
pub struct TalosctlProber {
    deadline: Duration,
}

impl TalosctlProber {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self {
            deadline: config.disk_probe_timeout(),
        }
    }
}

impl DiskProber for TalosctlProber {
    fn probe(&self, address: &str) -> Result<Vec<Disk>, Error> {
        talosctl::get_disks(address, self.deadline)
    }
}
