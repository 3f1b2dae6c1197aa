use crate::core::domain::{
    error::{ControlPlaneError, ControlPlaneResult},
    value_object::RemoteId,
};
use uuid::Uuid;

/// What a synchronization pass did to one instance row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceSyncAction {
    /// Remote-only VM: a row was created under the default project.
    Discovered,
    /// Present on both sides: disk snapshot, name and status were upserted.
    Refreshed,
    /// Local-only row converged to `Deleted`.
    MarkedDeleted,
    /// Local-only row was already `Deleted`; nothing was written.
    AlreadyDeleted,
    /// A lifecycle write newer than the observation kept its status.
    Deferred,
}

#[derive(Debug)]
pub struct InstanceSyncResult {
    pub pve_vm_id: RemoteId,
    pub outcome: ControlPlaneResult<InstanceSyncAction>,
}

#[derive(Debug)]
pub enum NodeSyncOutcome {
    Synchronized { instances: Vec<InstanceSyncResult> },
    /// The listing or the default project could not be obtained.
    Failed(ControlPlaneError),
}

#[derive(Debug)]
pub struct NodeSyncReport {
    pub node_id: Uuid,
    pub node_name: String,
    pub outcome: NodeSyncOutcome,
}

impl NodeSyncReport {
    /// Instances whose synchronization failed.
    pub fn failed_instances(&self) -> impl Iterator<Item = &InstanceSyncResult> {
        let instances = match &self.outcome {
            NodeSyncOutcome::Synchronized { instances } => instances.as_slice(),
            NodeSyncOutcome::Failed(_) => &[][..],
        };
        instances.iter().filter(|result| result.outcome.is_err())
    }
}

/// Result of one `synchronize_cluster` pass.
#[derive(Debug)]
pub struct ClusterSyncReport {
    pub cluster_id: Uuid,
    pub nodes: Vec<NodeSyncReport>,
    /// Nodes known locally that the hypervisor no longer lists. They are
    /// kept as is.
    pub missing_nodes: Vec<String>,
}

impl ClusterSyncReport {
    /// `true` when every node and every instance synchronized.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.nodes.iter().all(|node| {
            matches!(node.outcome, NodeSyncOutcome::Synchronized { .. })
                && node.failed_instances().next().is_none()
        })
    }

    /// Looks up a node's report by name.
    pub fn node(&self, name: &str) -> Option<&NodeSyncReport> {
        self.nodes.iter().find(|node| node.node_name == name)
    }
}

/// Per-cluster entry of `synchronize_all`.
#[derive(Debug)]
pub struct ClusterSyncResult {
    pub cluster_id: Uuid,
    pub outcome: ControlPlaneResult<ClusterSyncReport>,
}
