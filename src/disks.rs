use bosun_api::constants::MIN_DISK_SIZE;
use osutils::talosctl::Disk;

/// Disk roles chosen for one bare metal node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSelection {
    /// Device path Talos is installed onto.
    pub install_disk: String,
    /// Human readable description of the install disk.
    pub install_disk_info: String,
    /// Device path dedicated to Longhorn storage, when a separate one exists.
    pub longhorn_disk: Option<String>,
    pub longhorn_disk_info: Option<String>,
}

/// Picks an install disk and, when possible, a separate Longhorn disk.
///
/// Install disk: smallest NVMe, falling back to the smallest disk on any
/// other bus (boot partitions are small; large fast disks are better spent
/// on data). Longhorn disk: largest non-NVMe disk, falling back to the
/// largest NVMe disk other than the install pick. Loopback, read-only, and
/// sub-10GiB devices are never candidates.
///
/// Size ties are broken towards the smaller device id, so repeated runs
/// agree regardless of the order the node reports its disks in.
pub fn select_disks(disks: &[Disk]) -> Option<DiskSelection> {
    let candidates: Vec<&Disk> = disks
        .iter()
        .filter(|d| !d.is_loopback() && !d.readonly && d.size >= MIN_DISK_SIZE)
        .collect();

    let (nvme, other): (Vec<&Disk>, Vec<&Disk>) =
        candidates.into_iter().partition(|d| is_nvme(d));

    let install = if nvme.is_empty() {
        smallest(&other)
    } else {
        smallest(&nvme)
    }?;

    let longhorn = if other.is_empty() {
        let remaining: Vec<&Disk> = nvme
            .iter()
            .copied()
            .filter(|d| d.id != install.id)
            .collect();
        largest(&remaining)
    } else {
        largest(&other)
    }
    // Never assign the same device both roles.
    .filter(|d| d.id != install.id);

    Some(DiskSelection {
        install_disk: dev_path(install),
        install_disk_info: describe(install),
        longhorn_disk: longhorn.map(dev_path),
        longhorn_disk_info: longhorn.map(describe),
    })
}

fn is_nvme(disk: &Disk) -> bool {
    disk.id.starts_with("nvme")
}

fn smallest<'a>(disks: &[&'a Disk]) -> Option<&'a Disk> {
    disks
        .iter()
        .copied()
        .min_by(|a, b| a.size.cmp(&b.size).then_with(|| a.id.cmp(&b.id)))
}

fn largest<'a>(disks: &[&'a Disk]) -> Option<&'a Disk> {
    // min under (size desc, id asc): the largest disk, smallest id on ties
    disks
        .iter()
        .copied()
        .min_by(|a, b| b.size.cmp(&a.size).then_with(|| a.id.cmp(&b.id)))
}

fn dev_path(disk: &Disk) -> String {
    format!("/dev/{}", disk.id)
}

fn describe(disk: &Disk) -> String {
    let gib = disk.size as f64 / (1024.0 * 1024.0 * 1024.0);
    format!("{} ({:.1}GB)", disk.model, gib)
}
