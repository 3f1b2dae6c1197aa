//! In-process implementation of [`ControlPlaneStore`].
//!
//! Backs tests and single-process deployments. Rows live in one
//! [`RwLock`]-guarded table set; every write method holds the write lock for
//! the duration of a single-row upsert.

use crate::core::domain::{
    error::ControlPlaneResult,
    model::{
        BootDisk, Cluster, Folder, Instance, InstanceFilter, InstanceStatus, Node, Organization,
        Page, Price, Project, Zone,
    },
    repository::ControlPlaneStore,
    value_object::RemoteId,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    zones: HashMap<Uuid, Zone>,
    // Vecs keep insertion order, which is the placement order
    clusters: Vec<Cluster>,
    organizations: HashMap<Uuid, Organization>,
    folders: Vec<Folder>,
    projects: Vec<Project>,
    nodes: Vec<Node>,
    instances: HashMap<Uuid, Instance>,
    boot_disks: HashMap<Uuid, BootDisk>,
    prices: Vec<Price>,
    mutations: u64,
}

impl Tables {
    /// Finds the row an instance write lands on: same id, else the live row
    /// with the same `(node_id, pve_vm_id)`.
    ///
    /// `Deleted` rows are history and never adopted by natural key, so a
    /// recycled vendor id gets a fresh row.
    fn instance_slot(&self, instance: &Instance) -> Option<Uuid> {
        if self.instances.contains_key(&instance.id) {
            return Some(instance.id);
        }
        self.live_instance_by_remote_id(instance.node_id, instance.pve_vm_id)
            .map(|existing| existing.id)
    }

    fn live_instance_by_remote_id(&self, node_id: Uuid, pve_vm_id: RemoteId) -> Option<&Instance> {
        self.instances.values().find(|existing| {
            existing.node_id == node_id
                && existing.pve_vm_id == pve_vm_id
                && existing.status != InstanceStatus::Deleted
        })
    }

    /// Stores `instance` if its content differs from `stored`.
    fn write_instance(&mut self, stored: Option<&Instance>, mut instance: Instance) -> Instance {
        if let Some(stored) = stored {
            if stored.same_content(&instance) {
                return stored.clone();
            }
            instance.created_at = stored.created_at;
        }
        instance.updated_at = SystemTime::now();
        self.mutations += 1;
        self.instances.insert(instance.id, instance.clone());
        instance
    }
}

/// [`ControlPlaneStore`] kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of row inserts and content-changing updates performed through
    /// the [`ControlPlaneStore`] methods so far.
    pub async fn mutation_count(&self) -> u64 {
        self.tables.read().await.mutations
    }

    pub async fn insert_zone(&self, zone: Zone) {
        self.tables.write().await.zones.insert(zone.id, zone);
    }

    pub async fn insert_cluster(&self, cluster: Cluster) {
        let mut tables = self.tables.write().await;
        tables.clusters.retain(|existing| existing.id != cluster.id);
        tables.clusters.push(cluster);
    }

    pub async fn insert_organization(&self, organization: Organization) {
        self.tables
            .write()
            .await
            .organizations
            .insert(organization.id, organization);
    }

    pub async fn insert_folder(&self, folder: Folder) {
        self.tables.write().await.folders.push(folder);
    }

    pub async fn insert_project(&self, project: Project) {
        self.tables.write().await.projects.push(project);
    }

    pub async fn insert_price(&self, price: Price) {
        self.tables.write().await.prices.push(price);
    }

    pub async fn list_boot_disks(&self) -> Vec<BootDisk> {
        self.tables.read().await.boot_disks.values().cloned().collect()
    }
}

#[async_trait]
impl ControlPlaneStore for InMemoryStore {
    async fn find_zone(&self, id: Uuid) -> ControlPlaneResult<Option<Zone>> {
        Ok(self.tables.read().await.zones.get(&id).cloned())
    }

    async fn find_cluster(&self, id: Uuid) -> ControlPlaneResult<Option<Cluster>> {
        Ok(self
            .tables
            .read()
            .await
            .clusters
            .iter()
            .find(|cluster| cluster.id == id)
            .cloned())
    }

    async fn list_clusters(&self) -> ControlPlaneResult<Vec<Cluster>> {
        Ok(self.tables.read().await.clusters.clone())
    }

    async fn list_clusters_by_zone(&self, zone_id: Uuid) -> ControlPlaneResult<Vec<Cluster>> {
        Ok(self
            .tables
            .read()
            .await
            .clusters
            .iter()
            .filter(|cluster| cluster.zone_id == zone_id)
            .cloned()
            .collect())
    }

    async fn find_node(&self, id: Uuid) -> ControlPlaneResult<Option<Node>> {
        Ok(self
            .tables
            .read()
            .await
            .nodes
            .iter()
            .find(|node| node.id == id)
            .cloned())
    }

    async fn find_node_by_name(
        &self,
        cluster_id: Uuid,
        name: &str,
    ) -> ControlPlaneResult<Option<Node>> {
        Ok(self
            .tables
            .read()
            .await
            .nodes
            .iter()
            .find(|node| node.cluster_id == cluster_id && node.name == name)
            .cloned())
    }

    async fn list_nodes_by_cluster(&self, cluster_id: Uuid) -> ControlPlaneResult<Vec<Node>> {
        Ok(self
            .tables
            .read()
            .await
            .nodes
            .iter()
            .filter(|node| node.cluster_id == cluster_id)
            .cloned()
            .collect())
    }

    async fn upsert_node(&self, cluster_id: Uuid, name: &str) -> ControlPlaneResult<Node> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .nodes
            .iter()
            .find(|node| node.cluster_id == cluster_id && node.name == name)
        {
            return Ok(existing.clone());
        }

        let node = Node::new(cluster_id, name);
        debug!(cluster = %cluster_id, node = %name, "inserting node");
        tables.nodes.push(node.clone());
        tables.mutations += 1;
        Ok(node)
    }

    async fn find_instance(&self, id: Uuid) -> ControlPlaneResult<Option<Instance>> {
        Ok(self.tables.read().await.instances.get(&id).cloned())
    }

    async fn list_instances_by_node(&self, node_id: Uuid) -> ControlPlaneResult<Vec<Instance>> {
        let mut rows: Vec<Instance> = self
            .tables
            .read()
            .await
            .instances
            .values()
            .filter(|instance| instance.node_id == node_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn list_instances(&self, filter: &InstanceFilter) -> ControlPlaneResult<Page<Instance>> {
        let mut rows: Vec<Instance> = self
            .tables
            .read()
            .await
            .instances
            .values()
            .filter(|instance| filter.project_id.is_none_or(|id| instance.project_id == id))
            .filter(|instance| filter.node_id.is_none_or(|id| instance.node_id == id))
            .filter(|instance| filter.status.is_none_or(|status| instance.status == status))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(Page::paginate(rows, filter.page, filter.per_page))
    }

    async fn save_instance(&self, mut instance: Instance) -> ControlPlaneResult<Instance> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .instance_slot(&instance)
            .and_then(|id| tables.instances.get(&id).cloned());

        if let Some(stored) = &stored {
            instance.id = stored.id;
        }
        Ok(tables.write_instance(stored.as_ref(), instance))
    }

    async fn reconcile_instance(
        &self,
        mut instance: Instance,
        observed_at: SystemTime,
    ) -> ControlPlaneResult<Instance> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .instance_slot(&instance)
            .and_then(|id| tables.instances.get(&id).cloned());

        if let Some(stored) = &stored {
            instance.id = stored.id;
            // Ownership and disk linkage are never reassigned by an observation
            instance.project_id = stored.project_id;
            instance.boot_disk_id = stored.boot_disk_id;

            if stored.status_changed_at > observed_at {
                debug!(
                    instance = %stored.id,
                    stored = %stored.status,
                    observed = %instance.status,
                    "keeping status written after observation"
                );
                instance.status = stored.status;
                instance.status_changed_at = stored.status_changed_at;
            } else if stored.status == instance.status {
                instance.status_changed_at = stored.status_changed_at;
            } else {
                instance.status_changed_at = observed_at;
            }
        }

        Ok(tables.write_instance(stored.as_ref(), instance))
    }

    async fn find_boot_disk(&self, id: Uuid) -> ControlPlaneResult<Option<BootDisk>> {
        Ok(self.tables.read().await.boot_disks.get(&id).cloned())
    }

    async fn upsert_boot_disk(&self, mut disk: BootDisk) -> ControlPlaneResult<BootDisk> {
        let mut tables = self.tables.write().await;
        if let Some(stored) = tables.boot_disks.get(&disk.id) {
            if stored.same_content(&disk) {
                return Ok(stored.clone());
            }
            disk.created_at = stored.created_at;
        }
        disk.updated_at = SystemTime::now();
        tables.mutations += 1;
        tables.boot_disks.insert(disk.id, disk.clone());
        Ok(disk)
    }

    async fn find_project(&self, id: Uuid) -> ControlPlaneResult<Option<Project>> {
        Ok(self
            .tables
            .read()
            .await
            .projects
            .iter()
            .find(|project| project.id == id)
            .cloned())
    }

    async fn find_folder_by_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> ControlPlaneResult<Option<Folder>> {
        Ok(self
            .tables
            .read()
            .await
            .folders
            .iter()
            .find(|folder| folder.organization_id == organization_id && folder.name == name)
            .cloned())
    }

    async fn find_project_by_name(
        &self,
        folder_id: Uuid,
        name: &str,
    ) -> ControlPlaneResult<Option<Project>> {
        Ok(self
            .tables
            .read()
            .await
            .projects
            .iter()
            .find(|project| project.folder_id == folder_id && project.name == name)
            .cloned())
    }

    async fn list_prices_by_zone(&self, zone_id: Uuid) -> ControlPlaneResult<Vec<Price>> {
        Ok(self
            .tables
            .read()
            .await
            .prices
            .iter()
            .filter(|price| price.zone_id == zone_id)
            .cloned()
            .collect())
    }
}
