//! Extraction of boot disk metadata from a Proxmox VM configuration.
//!
//! The relevant keys look like:
//!
//! ```text
//! boot:   order=scsi0;ide2;net0
//! scsi0:  local-lvm:vm-105-disk-0,iothread=1,size=80G,ssd=1
//! ostype: l26
//! ```
//!
//! Proxmox omits `ostype` when it is left at `other`, and writes `size` in
//! the largest unit that divides it exactly (`size=10752M` after a +512M
//! resize).

use crate::core::domain::model::{BootDiskSpec, DiskType};
use std::collections::BTreeMap;

/// OS family Proxmox assumes when `ostype` is absent.
const DEFAULT_OSTYPE: &str = "other";

/// Outcome of [`parse_boot_disk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiskConfigParse {
    Parsed(BootDiskSpec),
    /// The expected keys or patterns are missing. `raw` is a compact dump
    /// of the configuration entries that were looked at.
    Unparseable { raw: String },
}

/// Finds the boot disk in `config` and reads its OS family, size and medium.
pub fn parse_boot_disk(config: &BTreeMap<String, String>) -> DiskConfigParse {
    let unparseable = || DiskConfigParse::Unparseable {
        raw: describe(config),
    };

    let Some(device) = boot_device(config) else {
        return unparseable();
    };
    let Some(disk) = config.get(device) else {
        return unparseable();
    };
    let Some(size_gb) = disk_size_gb(disk) else {
        return unparseable();
    };
    let os = config
        .get("ostype")
        .map(|os| os.trim())
        .filter(|os| !os.is_empty())
        .unwrap_or(DEFAULT_OSTYPE);

    let disk_type = if has_ssd_marker(disk) {
        DiskType::Ssd
    } else {
        DiskType::Hdd
    };

    DiskConfigParse::Parsed(BootDiskSpec {
        os: os.to_string(),
        size_gb,
        disk_type,
    })
}

/// Renders the `scsi0` and `boot` values for a new VM's boot disk.
pub fn render_boot_disk(storage: &str, spec: &BootDiskSpec) -> (String, String) {
    let mut scsi0 = format!("{}:{}", storage, spec.size_gb);
    if spec.disk_type == DiskType::Ssd {
        scsi0.push_str(",ssd=1");
    }
    (scsi0, "order=scsi0".to_string())
}

/// First disk device of `boot: order=...`, else the legacy `bootdisk` key.
fn boot_device(config: &BTreeMap<String, String>) -> Option<&str> {
    if let Some(order) = config
        .get("boot")
        .and_then(|boot| boot.split(',').find_map(|part| part.trim().strip_prefix("order=")))
    {
        // Skip CD-ROMs and NICs listed ahead of the disk
        return order.split(';').map(str::trim).find(|device| {
            !device.starts_with("net")
                && config
                    .get(*device)
                    .is_some_and(|value| !value.contains("media=cdrom"))
        });
    }

    config
        .get("bootdisk")
        .map(|device| device.trim())
        .filter(|device| !device.is_empty())
}

/// Size of the disk in GiB, rounded up to a whole GiB.
fn disk_size_gb(disk: &str) -> Option<u32> {
    let size = disk
        .split(',')
        .find_map(|part| part.trim().strip_prefix("size="))?;

    let unit = size.chars().last()?;
    let amount = &size[..size.len() - unit.len_utf8()];
    let kibibytes_per_unit: u64 = match unit {
        'K' => 1,
        'M' => 1024,
        'G' => 1024 * 1024,
        'T' => 1024 * 1024 * 1024,
        _ => return None,
    };

    let kibibytes = amount.parse::<u64>().ok()?.checked_mul(kibibytes_per_unit)?;
    u32::try_from(kibibytes.div_ceil(1024 * 1024)).ok()
}

fn has_ssd_marker(disk: &str) -> bool {
    disk.split(',')
        .map(str::trim)
        .any(|part| matches!(part, "ssd" | "ssd=1" | "ssd=on"))
}

fn describe(config: &BTreeMap<String, String>) -> String {
    ["boot", "bootdisk", "ostype"]
        .iter()
        .filter_map(|key| config.get(*key).map(|value| format!("{}: {}", key, value)))
        .collect::<Vec<_>>()
        .join("; ")
}
