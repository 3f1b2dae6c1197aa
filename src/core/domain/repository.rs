//! Persistence and lookup ports consumed by the services.

use crate::core::domain::{
    error::ControlPlaneResult,
    model::{
        BootDisk, Cluster, Folder, Instance, InstanceFilter, Node, Page, Price, Project, Zone,
    },
};
use async_trait::async_trait;
use std::time::SystemTime;
use uuid::Uuid;

/// Relational store for the control plane entities.
///
/// Every write is a single-row upsert by natural key; nothing here needs
/// more than single-row atomicity.
#[async_trait]
pub trait ControlPlaneStore: Send + Sync {
    async fn find_zone(&self, id: Uuid) -> ControlPlaneResult<Option<Zone>>;

    async fn find_cluster(&self, id: Uuid) -> ControlPlaneResult<Option<Cluster>>;

    async fn list_clusters(&self) -> ControlPlaneResult<Vec<Cluster>>;

    /// Clusters of a zone, in placement order.
    async fn list_clusters_by_zone(&self, zone_id: Uuid) -> ControlPlaneResult<Vec<Cluster>>;

    async fn find_node(&self, id: Uuid) -> ControlPlaneResult<Option<Node>>;

    async fn find_node_by_name(&self, cluster_id: Uuid, name: &str)
    -> ControlPlaneResult<Option<Node>>;

    /// Nodes of a cluster, in placement order.
    async fn list_nodes_by_cluster(&self, cluster_id: Uuid) -> ControlPlaneResult<Vec<Node>>;

    /// Inserts the node keyed by `(cluster_id, name)` unless it exists.
    async fn upsert_node(&self, cluster_id: Uuid, name: &str) -> ControlPlaneResult<Node>;

    async fn find_instance(&self, id: Uuid) -> ControlPlaneResult<Option<Instance>>;

    async fn list_instances_by_node(&self, node_id: Uuid) -> ControlPlaneResult<Vec<Instance>>;

    async fn list_instances(&self, filter: &InstanceFilter) -> ControlPlaneResult<Page<Instance>>;

    /// Lifecycle write: upserts by id, then by `(node_id, pve_vm_id)`.
    async fn save_instance(&self, instance: Instance) -> ControlPlaneResult<Instance>;

    /// Reconciliation write: like [`save_instance`](Self::save_instance),
    /// but the stored status wins when it was written after `observed_at`.
    async fn reconcile_instance(
        &self,
        instance: Instance,
        observed_at: SystemTime,
    ) -> ControlPlaneResult<Instance>;

    async fn find_boot_disk(&self, id: Uuid) -> ControlPlaneResult<Option<BootDisk>>;

    async fn upsert_boot_disk(&self, disk: BootDisk) -> ControlPlaneResult<BootDisk>;

    async fn find_project(&self, id: Uuid) -> ControlPlaneResult<Option<Project>>;

    async fn find_folder_by_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> ControlPlaneResult<Option<Folder>>;

    async fn find_project_by_name(
        &self,
        folder_id: Uuid,
        name: &str,
    ) -> ControlPlaneResult<Option<Project>>;

    async fn list_prices_by_zone(&self, zone_id: Uuid) -> ControlPlaneResult<Vec<Price>>;
}

/// Resolves the project that newly discovered instances are attached to.
#[async_trait]
pub trait DefaultProjectResolver: Send + Sync {
    async fn default_project(&self, cluster: &Cluster) -> ControlPlaneResult<Uuid>;
}
