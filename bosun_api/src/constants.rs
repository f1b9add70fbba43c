use const_format::formatcp;

// Configuration constants

/// Directory holding files exchanged with the Ansible playbooks.
pub const ANSIBLE_DIRECTORY: &str = "ansible";

/// Default location of the Terraform output snapshot.
pub const TERRAFORM_INVENTORY_PATH_DEFAULT: &str =
    formatcp!("{ANSIBLE_DIRECTORY}/terraform-inventory.json");

/// Default location of the generated cluster vars file.
pub const CLUSTER_VARS_PATH_DEFAULT: &str =
    formatcp!("{ANSIBLE_DIRECTORY}/roles/talos-cluster/vars/main.yml");

/// Address emitted for a node that could not be resolved. The playbooks
/// treat it as a value the operator must fill in by hand.
pub const UNRESOLVED_ADDRESS: &str = "unknown";

/// Disks smaller than this are never classification candidates. Filters out
/// USB boot media and similar small devices.
pub const MIN_DISK_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Comment line opening the manually maintained bare metal section.
pub const BAREMETAL_MARKER: &str = "# Bare metal workers";

/// Top-level key introducing the bare metal section.
pub const BAREMETAL_KEY: &str = "baremetal_workers:";
