//! Convergence of the stored instances with what the hypervisors report.
//!
//! A pass runs Cluster → Nodes (parallel) → Instances (parallel per node).
//! Every write is a single-row upsert, so a pass can be interrupted or
//! re-run at any point and converges to the same rows.

use crate::core::{
    config::ControlPlaneConfig,
    domain::{
        error::{ControlPlaneError, ControlPlaneResult},
        hypervisor::{HypervisorCapability, HypervisorFactory, RemoteInstance},
        model::{BootDisk, Cluster, Instance, InstanceStatus, Node},
        repository::{ControlPlaneStore, DefaultProjectResolver},
        value_object::RemoteId,
    },
};
use crate::reconciliation::application::response::sync_report::{
    ClusterSyncReport, ClusterSyncResult, InstanceSyncAction, InstanceSyncResult,
    NodeSyncOutcome, NodeSyncReport,
};
use futures::{StreamExt, future::join_all, stream};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Local and remote view of one remote id.
type InstancePair = (Option<Instance>, Option<RemoteInstance>);

pub struct SynchronizationService {
    store: Arc<dyn ControlPlaneStore>,
    hypervisors: Arc<dyn HypervisorFactory>,
    projects: Arc<dyn DefaultProjectResolver>,
    concurrency: usize,
}

impl SynchronizationService {
    pub fn new(
        store: Arc<dyn ControlPlaneStore>,
        hypervisors: Arc<dyn HypervisorFactory>,
        projects: Arc<dyn DefaultProjectResolver>,
        config: &ControlPlaneConfig,
    ) -> Self {
        Self {
            store,
            hypervisors,
            projects,
            concurrency: config.sync_concurrency.max(1),
        }
    }

    /// Synchronizes every stored cluster. A failing cluster is reported in
    /// its entry and does not stop the others.
    #[instrument(skip(self))]
    pub async fn synchronize_all(&self) -> ControlPlaneResult<Vec<ClusterSyncResult>> {
        let clusters = self.store.list_clusters().await?;
        info!(count = clusters.len(), "synchronizing clusters");

        let results = join_all(clusters.iter().map(|cluster| async move {
            let outcome = self.synchronize_cluster(cluster).await;
            if let Err(error) = &outcome {
                warn!(cluster = %cluster.id, %error, "cluster synchronization failed");
            }
            ClusterSyncResult {
                cluster_id: cluster.id,
                outcome,
            }
        }))
        .await;

        Ok(results)
    }

    /// Upserts the cluster's nodes from the hypervisor listing, then
    /// synchronizes each node.
    ///
    /// # Errors
    /// Fails only when the adapter cannot be built, the node listing fails or
    /// a node row cannot be written. Node-level failures end up in the report.
    #[instrument(skip(self, cluster), fields(cluster = %cluster.id, name = %cluster.name))]
    pub async fn synchronize_cluster(
        &self,
        cluster: &Cluster,
    ) -> ControlPlaneResult<ClusterSyncReport> {
        let api = self.hypervisors.for_cluster(cluster)?;
        let remote_nodes = api.list_nodes().await?;

        let mut nodes = Vec::with_capacity(remote_nodes.len());
        for remote in &remote_nodes {
            nodes.push(self.store.upsert_node(cluster.id, &remote.name).await?);
        }

        let listed: HashSet<&str> = remote_nodes.iter().map(|node| node.name.as_str()).collect();
        let missing_nodes: Vec<String> = self
            .store
            .list_nodes_by_cluster(cluster.id)
            .await?
            .into_iter()
            .filter(|node| !listed.contains(node.name.as_str()))
            .map(|node| node.name)
            .collect();
        for name in &missing_nodes {
            warn!(node = %name, "node no longer listed by the hypervisor");
        }

        let limiter = Semaphore::new(self.concurrency);
        let api = api.as_ref();
        let limiter = &limiter;
        let mut reports: Vec<NodeSyncReport> = stream::iter(nodes)
            .map(|node| async move {
                let outcome = match self.sync_node(api, limiter, cluster, &node).await {
                    Ok(instances) => NodeSyncOutcome::Synchronized { instances },
                    Err(error) => {
                        warn!(node = %node.name, %error, "node synchronization failed");
                        NodeSyncOutcome::Failed(error)
                    }
                };
                NodeSyncReport {
                    node_id: node.id,
                    node_name: node.name,
                    outcome,
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        reports.sort_by(|a, b| a.node_name.cmp(&b.node_name));

        info!(
            nodes = reports.len(),
            missing = missing_nodes.len(),
            "cluster synchronized"
        );
        Ok(ClusterSyncReport {
            cluster_id: cluster.id,
            nodes: reports,
            missing_nodes,
        })
    }

    /// Synchronizes the instances of one node.
    ///
    /// # Errors
    /// Fails when the default project cannot be resolved or either listing
    /// fails. Per-instance failures are returned in the results.
    #[instrument(skip(self, cluster, node), fields(cluster = %cluster.id, node = %node.name))]
    pub async fn synchronize_cluster_node(
        &self,
        cluster: &Cluster,
        node: &Node,
    ) -> ControlPlaneResult<Vec<InstanceSyncResult>> {
        if node.cluster_id != cluster.id {
            return Err(ControlPlaneError::InvalidReconciliationInput(format!(
                "node {} does not belong to cluster {}",
                node.id, cluster.id
            )));
        }
        let api = self.hypervisors.for_cluster(cluster)?;
        let limiter = Semaphore::new(self.concurrency);
        self.sync_node(api.as_ref(), &limiter, cluster, node).await
    }

    async fn sync_node(
        &self,
        api: &dyn HypervisorCapability,
        limiter: &Semaphore,
        cluster: &Cluster,
        node: &Node,
    ) -> ControlPlaneResult<Vec<InstanceSyncResult>> {
        let default_project = self.projects.default_project(cluster).await?;

        // Stamp before reading so lifecycle writes made during the pass win
        let observed_at = SystemTime::now();
        let remote = api.node(node).list_instances().await?;
        let local = self.store.list_instances_by_node(node.id).await?;

        let pairs = pair_by_remote_id(local, remote);
        debug!(instances = pairs.len(), "reconciling instances");

        let mut results: Vec<InstanceSyncResult> = stream::iter(pairs)
            .map(|(pve_vm_id, (existing, distant))| async move {
                let _permit = limiter.acquire().await.ok();
                let outcome = self
                    .synchronize_instance(api, node, existing, distant, default_project, observed_at)
                    .await;
                if let Err(error) = &outcome {
                    warn!(node = %node.name, vmid = %pve_vm_id, %error, "instance synchronization failed");
                }
                InstanceSyncResult { pve_vm_id, outcome }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|result| result.pve_vm_id);

        Ok(results)
    }

    /// Converges one instance row with its remote counterpart.
    async fn synchronize_instance(
        &self,
        api: &dyn HypervisorCapability,
        node: &Node,
        existing: Option<Instance>,
        distant: Option<RemoteInstance>,
        default_project: Uuid,
        observed_at: SystemTime,
    ) -> ControlPlaneResult<InstanceSyncAction> {
        match (existing, distant) {
            (None, None) => Err(ControlPlaneError::InvalidReconciliationInput(format!(
                "neither a local nor a remote instance on node {}",
                node.name
            ))),
            (Some(existing), None) if existing.status == InstanceStatus::Deleted => {
                Ok(InstanceSyncAction::AlreadyDeleted)
            }
            (Some(existing), None) => {
                // Gone remotely: the config can no longer be read
                let mut deleted = existing;
                deleted.status = InstanceStatus::Deleted;
                let saved = self.store.reconcile_instance(deleted, observed_at).await?;
                Ok(if saved.status == InstanceStatus::Deleted {
                    InstanceSyncAction::MarkedDeleted
                } else {
                    InstanceSyncAction::Deferred
                })
            }
            (existing, Some(distant)) => {
                let config = api
                    .node(node)
                    .instance(distant.pve_vm_id)
                    .get_config()
                    .await?;

                let (instance, action) = match existing {
                    Some(mut instance) => {
                        instance.name = distant.name;
                        instance.status = distant.status;
                        (instance, InstanceSyncAction::Refreshed)
                    }
                    None => {
                        let mut instance = Instance::new(
                            distant.pve_vm_id,
                            distant.name,
                            node.id,
                            default_project,
                            Uuid::new_v4(),
                            distant.status,
                        );
                        instance.status_changed_at = observed_at;
                        (instance, InstanceSyncAction::Discovered)
                    }
                };

                // The store may adopt a row written since the local listing;
                // its disk id is the one to refresh
                let saved = self.store.reconcile_instance(instance, observed_at).await?;
                self.store
                    .upsert_boot_disk(BootDisk::new(saved.boot_disk_id, config.disk))
                    .await?;

                Ok(if saved.status == distant.status {
                    action
                } else {
                    InstanceSyncAction::Deferred
                })
            }
        }
    }
}

/// Joins both listings on the remote id.
///
/// Several local rows may share a remote id when the vendor recycled it after
/// a deletion; the live row is preferred over `Deleted` history.
fn pair_by_remote_id(
    local: Vec<Instance>,
    remote: Vec<RemoteInstance>,
) -> BTreeMap<RemoteId, InstancePair> {
    let mut pairs: BTreeMap<RemoteId, InstancePair> = BTreeMap::new();

    for instance in local {
        let slot = &mut pairs.entry(instance.pve_vm_id).or_default().0;
        let replace = match slot {
            None => true,
            Some(current) => {
                current.status == InstanceStatus::Deleted
                    && (instance.status != InstanceStatus::Deleted
                        || instance.updated_at > current.updated_at)
            }
        };
        if replace {
            *slot = Some(instance);
        }
    }

    for instance in remote {
        let pve_vm_id = instance.pve_vm_id;
        pairs.entry(pve_vm_id).or_default().1 = Some(instance);
    }

    pairs
}
