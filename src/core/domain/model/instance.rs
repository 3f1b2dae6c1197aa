//! Domain model for virtual machine instances.

use crate::core::domain::value_object::{RemoteId, serde_helpers::system_time_millis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use uuid::Uuid;

/// Lifecycle status of an instance.
///
/// `Staging`, `Stopping` and `Deleting` are written optimistically by
/// lifecycle calls; `Running`, `Stopped` and `Deleted` are confirmed by
/// reconciliation. `Deleted` is terminal unless the VM reappears remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    Staging,
    Running,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
}

impl InstanceStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Staging => "STAGING",
            InstanceStatus::Running => "RUNNING",
            InstanceStatus::Stopping => "STOPPING",
            InstanceStatus::Stopped => "STOPPED",
            InstanceStatus::Deleting => "DELETING",
            InstanceStatus::Deleted => "DELETED",
        }
    }

    /// Returns `true` for the status reconciliation never reverts on its own.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Deleted)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A virtual machine as persisted by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: Uuid,
    /// Vendor identifier, unique within the node.
    pub pve_vm_id: RemoteId,
    pub name: String,
    pub node_id: Uuid,
    pub project_id: Uuid,
    pub boot_disk_id: Uuid,
    pub status: InstanceStatus,
    /// When `status` was last written. Orders lifecycle writes against
    /// reconciliation observations.
    #[serde(with = "system_time_millis")]
    pub status_changed_at: SystemTime,
    #[serde(with = "system_time_millis")]
    pub created_at: SystemTime,
    #[serde(with = "system_time_millis")]
    pub updated_at: SystemTime,
}

impl Instance {
    pub fn new(
        pve_vm_id: RemoteId,
        name: impl Into<String>,
        node_id: Uuid,
        project_id: Uuid,
        boot_disk_id: Uuid,
        status: InstanceStatus,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            pve_vm_id,
            name: name.into(),
            node_id,
            project_id,
            boot_disk_id,
            status,
            status_changed_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets a new status and stamps the change with the current time.
    pub fn transition_to(&mut self, status: InstanceStatus) {
        self.status = status;
        self.status_changed_at = SystemTime::now();
    }

    /// Compares the persisted attributes, ignoring `created_at`/`updated_at`.
    pub(crate) fn same_content(&self, other: &Instance) -> bool {
        self.id == other.id
            && self.pve_vm_id == other.pve_vm_id
            && self.name == other.name
            && self.node_id == other.node_id
            && self.project_id == other.project_id
            && self.boot_disk_id == other.boot_disk_id
            && self.status == other.status
            && self.status_changed_at == other.status_changed_at
    }
}
