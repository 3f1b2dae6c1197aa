//! Vendor-neutral hypervisor capability interface.
//!
//! Reconciliation and lifecycle code talk to hypervisors exclusively
//! through [`HypervisorCapability`]. A vendor adapter implements it once and
//! a [`HypervisorFactory`] picks the adapter for a cluster, so adding a
//! vendor never touches the services.

use crate::core::domain::{
    error::ControlPlaneResult,
    model::{BootDiskSpec, Cluster, InstanceStatus, Node},
    value_object::RemoteId,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// A host as listed by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    pub name: String,
    pub cluster_id: Uuid,
}

/// A VM as listed by the hypervisor, with its status already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInstance {
    pub name: String,
    pub node_id: Uuid,
    pub pve_vm_id: RemoteId,
    pub status: InstanceStatus,
}

/// Normalized configuration of a remote VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInstanceConfig {
    pub disk: BootDiskSpec,
}

/// What a new VM is provisioned with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceCreateConfig {
    pub name: String,
    pub cores: u32,
    pub memory_mb: u32,
    pub disk: BootDiskSpec,
}

/// Operations every hypervisor vendor adapter provides.
///
/// Each method is a single outbound exchange with no retry. Callers decide
/// whether a failure is worth another attempt (see
/// [`ControlPlaneError::is_retryable`](crate::ControlPlaneError::is_retryable)).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HypervisorCapability: Send + Sync {
    /// Enumerates the hosts of the cluster.
    async fn list_nodes(&self) -> ControlPlaneResult<Vec<RemoteNode>>;

    /// Asks the vendor for a free VM id. The id is not reserved: call it
    /// right before [`create_instance`](Self::create_instance).
    async fn next_instance_id(&self) -> ControlPlaneResult<RemoteId>;

    /// Enumerates the VMs of one host.
    async fn list_instances(&self, node: &Node) -> ControlPlaneResult<Vec<RemoteInstance>>;

    /// Provisions a VM. Returns once the hypervisor accepted the request.
    async fn create_instance(
        &self,
        node: &Node,
        id: RemoteId,
        config: &InstanceCreateConfig,
    ) -> ControlPlaneResult<()>;

    async fn delete_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()>;

    async fn start_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()>;

    async fn stop_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()>;

    /// Polls the current status of a VM.
    async fn instance_status(&self, node: &Node, id: RemoteId)
    -> ControlPlaneResult<InstanceStatus>;

    /// Reads and normalizes the configuration of a VM.
    async fn instance_config(
        &self,
        node: &Node,
        id: RemoteId,
    ) -> ControlPlaneResult<RemoteInstanceConfig>;
}

impl<'d> dyn HypervisorCapability + 'd {
    /// Scopes calls to one host: `api.node(&node).instance(id).start()`.
    pub fn node<'a>(&'a self, node: &'a Node) -> NodeScope<'a> {
        NodeScope { api: self, node }
    }
}

/// Hypervisor operations bound to a node.
pub struct NodeScope<'a> {
    api: &'a dyn HypervisorCapability,
    node: &'a Node,
}

impl<'a> NodeScope<'a> {
    pub fn instance(&self, id: RemoteId) -> InstanceScope<'a> {
        InstanceScope {
            api: self.api,
            node: self.node,
            id,
        }
    }

    pub async fn list_instances(&self) -> ControlPlaneResult<Vec<RemoteInstance>> {
        self.api.list_instances(self.node).await
    }
}

/// Hypervisor operations bound to one VM on a node.
pub struct InstanceScope<'a> {
    api: &'a dyn HypervisorCapability,
    node: &'a Node,
    id: RemoteId,
}

impl InstanceScope<'_> {
    pub async fn create(&self, config: &InstanceCreateConfig) -> ControlPlaneResult<()> {
        self.api.create_instance(self.node, self.id, config).await
    }

    pub async fn delete(&self) -> ControlPlaneResult<()> {
        self.api.delete_instance(self.node, self.id).await
    }

    pub async fn start(&self) -> ControlPlaneResult<()> {
        self.api.start_instance(self.node, self.id).await
    }

    pub async fn stop(&self) -> ControlPlaneResult<()> {
        self.api.stop_instance(self.node, self.id).await
    }

    pub async fn get_status(&self) -> ControlPlaneResult<InstanceStatus> {
        self.api.instance_status(self.node, self.id).await
    }

    pub async fn get_config(&self) -> ControlPlaneResult<RemoteInstanceConfig> {
        self.api.instance_config(self.node, self.id).await
    }
}

/// Builds the capability adapter for a cluster from its stored metadata.
pub trait HypervisorFactory: Send + Sync {
    fn for_cluster(&self, cluster: &Cluster) -> ControlPlaneResult<Arc<dyn HypervisorCapability>>;
}
