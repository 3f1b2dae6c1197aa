//! Instance lifecycle operations exposed to the application layer.
//!
//! Mutating calls go to the hypervisor first, then write a transitional
//! status locally (`Staging`, `Stopping`, `Deleting`). The next
//! synchronization pass confirms or corrects it.

use crate::core::{
    config::ControlPlaneConfig,
    domain::{
        error::{ControlPlaneError, ControlPlaneResult, ValidationError},
        hypervisor::{HypervisorCapability, HypervisorFactory, InstanceCreateConfig},
        model::{
            BootDisk, Cluster, Instance, InstanceFilter, InstanceStatus, Node, Page,
            PricedResource,
        },
        repository::{ControlPlaneStore, DefaultProjectResolver},
        value_object::RemoteId,
    },
};
use crate::lifecycle::application::{
    request::{
        create_instance_request::CreateInstanceRequest,
        update_instance_request::UpdateInstanceRequest,
    },
    response::instance_price::InstancePrice,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct InstanceService {
    store: Arc<dyn ControlPlaneStore>,
    hypervisors: Arc<dyn HypervisorFactory>,
    projects: Arc<dyn DefaultProjectResolver>,
    create_attempts: u32,
}

impl InstanceService {
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
            create_attempts: config.create_attempts.max(1),
        }
    }

    pub async fn list(&self, filter: &InstanceFilter) -> ControlPlaneResult<Page<Instance>> {
        self.store.list_instances(filter).await
    }

    pub async fn get(&self, id: Uuid) -> ControlPlaneResult<Instance> {
        self.store
            .find_instance(id)
            .await?
            .ok_or_else(|| ControlPlaneError::not_found("Instance", id.to_string()))
    }

    /// Places and provisions a new instance.
    ///
    /// Placement takes the first cluster of the zone that has a node, then
    /// that cluster's first node. There is no load or capacity check.
    ///
    /// # Errors
    /// `NoCapacity` when the zone has no node, before any remote call.
    #[instrument(skip(self, request), fields(zone = %request.zone_id, name = %request.name))]
    pub async fn create(&self, request: CreateInstanceRequest) -> ControlPlaneResult<Instance> {
        request.validate()?;

        let zone = self
            .store
            .find_zone(request.zone_id)
            .await?
            .ok_or_else(|| ControlPlaneError::not_found("Zone", request.zone_id.to_string()))?;
        let (cluster, node) = self.place(zone.id).await?;

        let project_id = match request.project_id {
            Some(project_id) => {
                self.store
                    .find_project(project_id)
                    .await?
                    .ok_or_else(|| ControlPlaneError::not_found("Project", project_id.to_string()))?
                    .id
            }
            None => self.projects.default_project(&cluster).await?,
        };

        let api = self.hypervisors.for_cluster(&cluster)?;
        let config = InstanceCreateConfig {
            name: request.name.clone(),
            cores: request.cores,
            memory_mb: request.memory_mb,
            disk: request.boot_disk(),
        };
        let pve_vm_id = self.provision(api.as_ref(), &node, &config).await?;

        let disk = self
            .store
            .upsert_boot_disk(BootDisk::new(Uuid::new_v4(), config.disk))
            .await?;
        let instance = self
            .store
            .save_instance(Instance::new(
                pve_vm_id,
                request.name,
                node.id,
                project_id,
                disk.id,
                InstanceStatus::Staging,
            ))
            .await?;

        info!(instance = %instance.id, node = %node.name, vmid = %pve_vm_id, "instance created");
        Ok(instance)
    }

    /// Applies a local-only patch. The hypervisor is not called.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        id: Uuid,
        request: UpdateInstanceRequest,
    ) -> ControlPlaneResult<Instance> {
        request.validate()?;
        let mut instance = self.get(id).await?;
        if request.is_empty() {
            return Ok(instance);
        }

        if let Some(project_id) = request.project_id {
            if self.store.find_project(project_id).await?.is_none() {
                return Err(ControlPlaneError::not_found("Project", project_id.to_string()));
            }
            instance.project_id = project_id;
        }
        if let Some(name) = request.name {
            instance.name = name;
        }

        self.store.save_instance(instance).await
    }

    #[instrument(skip(self))]
    pub async fn start(&self, id: Uuid) -> ControlPlaneResult<Instance> {
        let instance = self.get(id).await?;
        ensure_not_in(
            &instance,
            "start",
            &[InstanceStatus::Deleting, InstanceStatus::Deleted],
        )?;
        let (node, api) = self.locate(&instance).await?;
        api.node(&node).instance(instance.pve_vm_id).start().await?;
        self.record_transition(instance, InstanceStatus::Staging).await
    }

    #[instrument(skip(self))]
    pub async fn stop(&self, id: Uuid) -> ControlPlaneResult<Instance> {
        let instance = self.get(id).await?;
        ensure_not_in(
            &instance,
            "stop",
            &[InstanceStatus::Deleting, InstanceStatus::Deleted],
        )?;
        let (node, api) = self.locate(&instance).await?;
        api.node(&node).instance(instance.pve_vm_id).stop().await?;
        self.record_transition(instance, InstanceStatus::Stopping).await
    }

    #[instrument(skip(self))]
    pub async fn destroy(&self, id: Uuid) -> ControlPlaneResult<Instance> {
        let instance = self.get(id).await?;
        ensure_not_in(&instance, "destroy", &[InstanceStatus::Deleted])?;
        let (node, api) = self.locate(&instance).await?;
        api.node(&node).instance(instance.pve_vm_id).delete().await?;
        self.record_transition(instance, InstanceStatus::Deleting).await
    }

    /// Polls the hypervisor for the live status. Nothing is written.
    ///
    /// A `Deleted` instance is answered locally.
    #[instrument(skip(self))]
    pub async fn get_status(&self, id: Uuid) -> ControlPlaneResult<InstanceStatus> {
        let instance = self.get(id).await?;
        if instance.status == InstanceStatus::Deleted {
            return Ok(InstanceStatus::Deleted);
        }
        let (node, api) = self.locate(&instance).await?;
        api.node(&node)
            .instance(instance.pve_vm_id)
            .get_status()
            .await
    }

    /// Prices `cpu` cores and `ram` GiB in a zone. `None` when the zone
    /// lacks a CPU or a RAM price.
    pub async fn get_current_price(
        &self,
        zone_id: Uuid,
        cpu: u32,
        ram: u32,
    ) -> ControlPlaneResult<Option<InstancePrice>> {
        let prices = self.store.list_prices_by_zone(zone_id).await?;
        let unit = |resource: PricedResource| {
            prices
                .iter()
                .find(|price| price.resource_type == resource)
                .map(|price| price.price_per_unit)
        };

        Ok(match (unit(PricedResource::Cpu), unit(PricedResource::Ram)) {
            (Some(cpu_unit), Some(ram_unit)) => Some(InstancePrice::from_unit_prices(
                cpu_unit, cpu, ram_unit, ram,
            )),
            _ => None,
        })
    }

    async fn place(&self, zone_id: Uuid) -> ControlPlaneResult<(Cluster, Node)> {
        for cluster in self.store.list_clusters_by_zone(zone_id).await? {
            if let Some(node) = self
                .store
                .list_nodes_by_cluster(cluster.id)
                .await?
                .into_iter()
                .next()
            {
                return Ok((cluster, node));
            }
        }
        Err(ControlPlaneError::NoCapacity {
            zone_id: zone_id.to_string(),
        })
    }

    /// Allocates a remote id and creates the VM, retrying when the id is
    /// taken in between.
    async fn provision(
        &self,
        api: &dyn HypervisorCapability,
        node: &Node,
        config: &InstanceCreateConfig,
    ) -> ControlPlaneResult<RemoteId> {
        let mut attempt = 1;
        loop {
            let pve_vm_id = api.next_instance_id().await?;
            match api.node(node).instance(pve_vm_id).create(config).await {
                Ok(()) => return Ok(pve_vm_id),
                Err(ControlPlaneError::RemoteIdConflict { remote_id })
                    if attempt < self.create_attempts =>
                {
                    warn!(vmid = %remote_id, attempt, "remote id taken, allocating another");
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Resolves Instance → Node → Cluster → adapter.
    async fn locate(
        &self,
        instance: &Instance,
    ) -> ControlPlaneResult<(Node, Arc<dyn HypervisorCapability>)> {
        let node = self
            .store
            .find_node(instance.node_id)
            .await?
            .ok_or_else(|| ControlPlaneError::not_found("Node", instance.node_id.to_string()))?;
        let cluster = self
            .store
            .find_cluster(node.cluster_id)
            .await?
            .ok_or_else(|| ControlPlaneError::not_found("Cluster", node.cluster_id.to_string()))?;
        let api = self.hypervisors.for_cluster(&cluster)?;
        Ok((node, api))
    }

    async fn record_transition(
        &self,
        mut instance: Instance,
        status: InstanceStatus,
    ) -> ControlPlaneResult<Instance> {
        instance.transition_to(status);
        let saved = self.store.save_instance(instance).await?;
        info!(instance = %saved.id, status = %saved.status, "status recorded");
        Ok(saved)
    }
}

fn ensure_not_in(
    instance: &Instance,
    action: &str,
    forbidden: &[InstanceStatus],
) -> Result<(), ValidationError> {
    if forbidden.contains(&instance.status) {
        return Err(ValidationError::ConstraintViolation(format!(
            "cannot {} instance {} while {}",
            action, instance.id, instance.status
        )));
    }
    Ok(())
}
