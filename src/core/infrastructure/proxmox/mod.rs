//! Proxmox VE implementation of [`HypervisorCapability`].

pub mod disk_config;
pub mod model;
pub mod status;

use crate::core::{
    config::ControlPlaneConfig,
    domain::{
        error::{ControlPlaneError, ControlPlaneResult},
        hypervisor::{
            HypervisorCapability, InstanceCreateConfig, RemoteInstance, RemoteInstanceConfig,
            RemoteNode,
        },
        model::{InstanceStatus, Node},
        value_object::RemoteId,
    },
    infrastructure::api_client::{ApiClient, ApiFailure},
};
use async_trait::async_trait;
use disk_config::{DiskConfigParse, parse_boot_disk, render_boot_disk};
use model::{CreateVmParams, NextId, NodeListItem, VmListItem, VmStatusCurrent, flatten_config};
use serde_json::Value;
use status::normalize_status;
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Controller type for the boot disk of new VMs.
const SCSI_CONTROLLER: &str = "virtio-scsi-single";

/// Talks to one Proxmox cluster through its API.
#[derive(Debug)]
pub struct ProxmoxHypervisor {
    client: ApiClient,
    cluster_id: Uuid,
    storage: String,
}

impl ProxmoxHypervisor {
    pub fn new(client: ApiClient, cluster_id: Uuid, config: &ControlPlaneConfig) -> Self {
        Self {
            client,
            cluster_id,
            storage: config.default_storage.clone(),
        }
    }

    fn vm_path(node: &Node, id: RemoteId) -> String {
        format!("nodes/{}/qemu/{}", node.name, id)
    }
}

#[async_trait]
impl HypervisorCapability for ProxmoxHypervisor {
    #[instrument(skip(self), fields(cluster = %self.cluster_id))]
    async fn list_nodes(&self) -> ControlPlaneResult<Vec<RemoteNode>> {
        let nodes: Vec<NodeListItem> = self.client.get("nodes").await?;
        debug!(count = nodes.len(), "listed nodes");
        Ok(nodes
            .into_iter()
            .map(|item| RemoteNode {
                name: item.node,
                cluster_id: self.cluster_id,
            })
            .collect())
    }

    #[instrument(skip(self), fields(cluster = %self.cluster_id))]
    async fn next_instance_id(&self) -> ControlPlaneResult<RemoteId> {
        let NextId(raw) = self.client.get("cluster/nextid").await?;
        RemoteId::new(&raw).map_err(|_| ControlPlaneError::unrecognized("next id", raw))
    }

    #[instrument(skip(self, node), fields(cluster = %self.cluster_id, node = %node.name))]
    async fn list_instances(&self, node: &Node) -> ControlPlaneResult<Vec<RemoteInstance>> {
        let vms: Vec<VmListItem> = self
            .client
            .get(&format!("nodes/{}/qemu", node.name))
            .await?;
        debug!(count = vms.len(), "listed instances");

        vms.into_iter()
            .map(|vm| {
                let pve_vm_id = RemoteId::new(&vm.vmid)
                    .map_err(|_| ControlPlaneError::unrecognized("vmid", vm.vmid.as_str()))?;
                Ok(RemoteInstance {
                    name: vm.name.unwrap_or_else(|| format!("VM {}", pve_vm_id)),
                    node_id: node.id,
                    pve_vm_id,
                    status: normalize_status(&vm.status)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, node, config), fields(node = %node.name, vmid = %id, name = %config.name))]
    async fn create_instance(
        &self,
        node: &Node,
        id: RemoteId,
        config: &InstanceCreateConfig,
    ) -> ControlPlaneResult<()> {
        let (scsi0, boot) = render_boot_disk(&self.storage, &config.disk);
        let params = CreateVmParams {
            vmid: id.vmid(),
            name: config.name.clone(),
            cores: config.cores,
            memory: config.memory_mb,
            ostype: config.disk.os.clone(),
            scsihw: SCSI_CONTROLLER.to_string(),
            scsi0,
            boot,
        };

        match self
            .client
            .try_post::<_, Value>(&format!("nodes/{}/qemu", node.name), &params)
            .await
        {
            Ok(_) => Ok(()),
            Err(ApiFailure::Rejected { message, .. }) if message.contains("already exists") => {
                Err(ControlPlaneError::RemoteIdConflict {
                    remote_id: id.to_string(),
                })
            }
            Err(failure) => Err(failure.into()),
        }
    }

    #[instrument(skip(self, node), fields(node = %node.name, vmid = %id))]
    async fn delete_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()> {
        let _: Value = self
            .client
            .delete(&format!("{}?purge=1", Self::vm_path(node, id)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, node), fields(node = %node.name, vmid = %id))]
    async fn start_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()> {
        let _: Value = self
            .client
            .post(
                &format!("{}/status/start", Self::vm_path(node, id)),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, node), fields(node = %node.name, vmid = %id))]
    async fn stop_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()> {
        let _: Value = self
            .client
            .post(
                &format!("{}/status/stop", Self::vm_path(node, id)),
                &serde_json::json!({}),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self, node), fields(node = %node.name, vmid = %id))]
    async fn instance_status(
        &self,
        node: &Node,
        id: RemoteId,
    ) -> ControlPlaneResult<InstanceStatus> {
        let current: VmStatusCurrent = self
            .client
            .get(&format!("{}/status/current", Self::vm_path(node, id)))
            .await?;
        normalize_status(&current.status)
    }

    #[instrument(skip(self, node), fields(node = %node.name, vmid = %id))]
    async fn instance_config(
        &self,
        node: &Node,
        id: RemoteId,
    ) -> ControlPlaneResult<RemoteInstanceConfig> {
        let raw: BTreeMap<String, Value> = self
            .client
            .get(&format!("{}/config", Self::vm_path(node, id)))
            .await?;

        match parse_boot_disk(&flatten_config(raw)) {
            DiskConfigParse::Parsed(disk) => Ok(RemoteInstanceConfig { disk }),
            DiskConfigParse::Unparseable { raw } => {
                Err(ControlPlaneError::unrecognized("boot disk config", raw))
            }
        }
    }
}
