//! Domain model for instance boot volumes.

use crate::core::domain::value_object::serde_helpers::system_time_millis;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Storage medium of a boot disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiskType {
    Ssd,
    Hdd,
}

/// Boot disk metadata as the hypervisor reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BootDiskSpec {
    /// OS family (Proxmox `ostype`, e.g. `l26`, `win11`).
    pub os: String,
    /// Size in GiB.
    pub size_gb: u32,
    #[serde(rename = "type")]
    pub disk_type: DiskType,
}

/// Snapshot of an instance's boot volume. One-to-one with its instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BootDisk {
    pub id: Uuid,
    pub os: String,
    pub size_gb: u32,
    #[serde(rename = "type")]
    pub disk_type: DiskType,
    #[serde(with = "system_time_millis")]
    pub created_at: SystemTime,
    #[serde(with = "system_time_millis")]
    pub updated_at: SystemTime,
}

impl BootDisk {
    pub fn new(id: Uuid, spec: BootDiskSpec) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            os: spec.os,
            size_gb: spec.size_gb,
            disk_type: spec.disk_type,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the hypervisor-facing part of the row.
    #[must_use]
    pub fn spec(&self) -> BootDiskSpec {
        BootDiskSpec {
            os: self.os.clone(),
            size_gb: self.size_gb,
            disk_type: self.disk_type,
        }
    }

    /// Compares the persisted attributes, ignoring timestamps.
    pub(crate) fn same_content(&self, other: &BootDisk) -> bool {
        self.id == other.id
            && self.os == other.os
            && self.size_gb == other.size_gb
            && self.disk_type == other.disk_type
    }
}
