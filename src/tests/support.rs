//! Shared fixtures: an in-memory hypervisor and a seeded store.

use crate::{
    BootDisk, BootDiskSpec, Cluster, ClusterCredentials, ControlPlane, ControlPlaneConfig,
    ControlPlaneError, ControlPlaneResult, ControlPlaneStore, DiskType, Folder,
    HypervisorCapability, HypervisorFactory, InMemoryStore, Instance, InstanceCreateConfig,
    InstanceStatus, Node, Organization, Price, PricedResource, Project, RemoteId, RemoteInstance,
    RemoteInstanceConfig, RemoteNode, Zone,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn ssd(size_gb: u32) -> BootDiskSpec {
    BootDiskSpec {
        os: "l26".to_string(),
        size_gb,
        disk_type: DiskType::Ssd,
    }
}

#[derive(Debug, Clone)]
struct FakeVm {
    name: String,
    status: InstanceStatus,
    disk: BootDiskSpec,
}

#[derive(Default)]
struct FakeState {
    nodes: Vec<String>,
    vms: BTreeMap<String, BTreeMap<u32, FakeVm>>,
    failing_listings: HashSet<String>,
    failing_configs: HashSet<u32>,
    conflicts_remaining: u32,
    write_during_listing: Option<(Arc<dyn ControlPlaneStore>, Instance)>,
    write_during_config: Option<(Arc<dyn ControlPlaneStore>, Instance)>,
    calls: Vec<String>,
}

/// Hypervisor kept in memory, with failure injection and a call log.
pub struct FakeHypervisor {
    cluster_id: Uuid,
    state: Mutex<FakeState>,
}

impl FakeHypervisor {
    pub fn new(cluster_id: Uuid) -> Self {
        Self {
            cluster_id,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn add_node(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.nodes.push(name.to_string());
        state.vms.entry(name.to_string()).or_default();
    }

    pub fn add_vm(&self, node: &str, vmid: u32, name: &str, status: InstanceStatus, disk: BootDiskSpec) {
        self.state
            .lock()
            .unwrap()
            .vms
            .entry(node.to_string())
            .or_default()
            .insert(
                vmid,
                FakeVm {
                    name: name.to_string(),
                    status,
                    disk,
                },
            );
    }

    pub fn remove_vm(&self, node: &str, vmid: u32) {
        if let Some(vms) = self.state.lock().unwrap().vms.get_mut(node) {
            vms.remove(&vmid);
        }
    }

    pub fn vm_status(&self, node: &str, vmid: u32) -> Option<InstanceStatus> {
        self.state
            .lock()
            .unwrap()
            .vms
            .get(node)
            .and_then(|vms| vms.get(&vmid))
            .map(|vm| vm.status)
    }

    pub fn vm_disk(&self, node: &str, vmid: u32) -> Option<BootDiskSpec> {
        self.state
            .lock()
            .unwrap()
            .vms
            .get(node)
            .and_then(|vms| vms.get(&vmid))
            .map(|vm| vm.disk.clone())
    }

    pub fn fail_listing(&self, node: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_listings
            .insert(node.to_string());
    }

    pub fn fail_config(&self, vmid: u32) {
        self.state.lock().unwrap().failing_configs.insert(vmid);
    }

    /// The next `count` creates find their id already taken.
    pub fn steal_next_ids(&self, count: u32) {
        self.state.lock().unwrap().conflicts_remaining = count;
    }

    /// Saves `instance` through `store` while the next listing is in flight.
    pub fn write_during_listing(&self, store: Arc<dyn ControlPlaneStore>, instance: Instance) {
        self.state.lock().unwrap().write_during_listing = Some((store, instance));
    }

    /// Saves `instance` through `store` while the next config read is in
    /// flight, after the pass has read the local rows.
    pub fn write_during_config(&self, store: Arc<dyn ControlPlaneStore>, instance: Instance) {
        self.state.lock().unwrap().write_during_config = Some((store, instance));
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn with_vm<T>(
        &self,
        node: &Node,
        id: RemoteId,
        f: impl FnOnce(&mut FakeVm) -> T,
    ) -> ControlPlaneResult<T> {
        let mut state = self.state.lock().unwrap();
        state
            .vms
            .get_mut(&node.name)
            .and_then(|vms| vms.get_mut(&id.vmid()))
            .map(f)
            .ok_or_else(|| {
                ControlPlaneError::RemoteUnavailable(format!(
                    "API error (500): VM {} does not exist on {}",
                    id, node.name
                ))
            })
    }
}

#[async_trait]
impl HypervisorCapability for FakeHypervisor {
    async fn list_nodes(&self) -> ControlPlaneResult<Vec<RemoteNode>> {
        self.record("list_nodes".to_string());
        Ok(self
            .state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .map(|name| RemoteNode {
                name: name.clone(),
                cluster_id: self.cluster_id,
            })
            .collect())
    }

    async fn next_instance_id(&self) -> ControlPlaneResult<RemoteId> {
        self.record("next_instance_id".to_string());
        let state = self.state.lock().unwrap();
        let taken: HashSet<u32> = state.vms.values().flat_map(|vms| vms.keys().copied()).collect();
        let free = (100..).find(|id| !taken.contains(id)).unwrap();
        Ok(RemoteId::from_vmid(free))
    }

    async fn list_instances(&self, node: &Node) -> ControlPlaneResult<Vec<RemoteInstance>> {
        self.record(format!("list_instances {}", node.name));
        let (listing, pending) = {
            let mut state = self.state.lock().unwrap();
            if state.failing_listings.contains(&node.name) {
                return Err(ControlPlaneError::RemoteUnavailable(format!(
                    "HTTP request failed: {} unreachable",
                    node.name
                )));
            }
            let listing: Vec<RemoteInstance> = state
                .vms
                .get(&node.name)
                .into_iter()
                .flatten()
                .map(|(vmid, vm)| RemoteInstance {
                    name: vm.name.clone(),
                    node_id: node.id,
                    pve_vm_id: RemoteId::from_vmid(*vmid),
                    status: vm.status,
                })
                .collect();
            (listing, state.write_during_listing.take())
        };

        if let Some((store, mut instance)) = pending {
            // A lifecycle call lands after the hypervisor answered
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
            instance.transition_to(instance.status);
            store.save_instance(instance).await?;
        }
        Ok(listing)
    }

    async fn create_instance(
        &self,
        node: &Node,
        id: RemoteId,
        config: &InstanceCreateConfig,
    ) -> ControlPlaneResult<()> {
        self.record(format!("create {} {}", node.name, id));
        let mut state = self.state.lock().unwrap();
        if state.conflicts_remaining > 0 {
            state.conflicts_remaining -= 1;
            state.vms.entry(node.name.clone()).or_default().insert(
                id.vmid(),
                FakeVm {
                    name: format!("foreign-{}", id),
                    status: InstanceStatus::Stopped,
                    disk: ssd(8),
                },
            );
            return Err(ControlPlaneError::RemoteIdConflict {
                remote_id: id.to_string(),
            });
        }
        state.vms.entry(node.name.clone()).or_default().insert(
            id.vmid(),
            FakeVm {
                name: config.name.clone(),
                status: InstanceStatus::Stopped,
                disk: config.disk.clone(),
            },
        );
        Ok(())
    }

    async fn delete_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()> {
        self.record(format!("delete {} {}", node.name, id));
        self.with_vm(node, id, |_| ())?;
        self.remove_vm(&node.name, id.vmid());
        Ok(())
    }

    async fn start_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()> {
        self.record(format!("start {} {}", node.name, id));
        self.with_vm(node, id, |vm| vm.status = InstanceStatus::Running)
    }

    async fn stop_instance(&self, node: &Node, id: RemoteId) -> ControlPlaneResult<()> {
        self.record(format!("stop {} {}", node.name, id));
        self.with_vm(node, id, |vm| vm.status = InstanceStatus::Stopped)
    }

    async fn instance_status(
        &self,
        node: &Node,
        id: RemoteId,
    ) -> ControlPlaneResult<InstanceStatus> {
        self.record(format!("status {} {}", node.name, id));
        self.with_vm(node, id, |vm| vm.status)
    }

    async fn instance_config(
        &self,
        node: &Node,
        id: RemoteId,
    ) -> ControlPlaneResult<RemoteInstanceConfig> {
        self.record(format!("config {} {}", node.name, id));
        let pending = {
            let mut state = self.state.lock().unwrap();
            if state.failing_configs.contains(&id.vmid()) {
                return Err(ControlPlaneError::unrecognized(
                    "boot disk config",
                    "boot: order=net0; ostype: l26",
                ));
            }
            state.write_during_config.take()
        };

        if let Some((store, mut instance)) = pending {
            instance.transition_to(instance.status);
            store.save_instance(instance).await?;
        }
        self.with_vm(node, id, |vm| RemoteInstanceConfig {
            disk: vm.disk.clone(),
        })
    }
}

/// Routes each cluster to a registered adapter. Unknown clusters are
/// unreachable.
#[derive(Default)]
pub struct FakeHypervisorFactory {
    by_cluster: Mutex<HashMap<Uuid, Arc<dyn HypervisorCapability>>>,
}

impl FakeHypervisorFactory {
    pub fn register(&self, cluster_id: Uuid, api: Arc<dyn HypervisorCapability>) {
        self.by_cluster.lock().unwrap().insert(cluster_id, api);
    }
}

impl HypervisorFactory for FakeHypervisorFactory {
    fn for_cluster(&self, cluster: &Cluster) -> ControlPlaneResult<Arc<dyn HypervisorCapability>> {
        self.by_cluster
            .lock()
            .unwrap()
            .get(&cluster.id)
            .cloned()
            .ok_or_else(|| {
                ControlPlaneError::RemoteUnavailable(format!("no route to {}", cluster.name))
            })
    }
}

/// A store seeded with one organization owning the default folder and
/// project, one zone and one cluster backed by a [`FakeHypervisor`].
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub factory: Arc<FakeHypervisorFactory>,
    pub hypervisor: Arc<FakeHypervisor>,
    pub organization: Organization,
    pub default_project: Project,
    pub zone: Zone,
    pub cluster: Cluster,
    pub control_plane: ControlPlane,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(ControlPlaneConfig::default()).await
    }

    pub async fn with_config(config: ControlPlaneConfig) -> Self {
        init_tracing();
        let store = Arc::new(InMemoryStore::new());

        let organization = Organization {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
        };
        let folder = Folder {
            id: Uuid::new_v4(),
            organization_id: organization.id,
            name: "Interne".to_string(),
        };
        let default_project = Project {
            id: Uuid::new_v4(),
            folder_id: folder.id,
            name: "Interne".to_string(),
        };
        let zone = Zone {
            id: Uuid::new_v4(),
            name: "par1".to_string(),
        };
        let cluster = cluster_in(&organization, &zone, "pve-par1");

        store.insert_organization(organization.clone()).await;
        store.insert_folder(folder).await;
        store.insert_project(default_project.clone()).await;
        store.insert_zone(zone.clone()).await;
        store.insert_cluster(cluster.clone()).await;

        let hypervisor = Arc::new(FakeHypervisor::new(cluster.id));
        let factory = Arc::new(FakeHypervisorFactory::default());
        factory.register(cluster.id, hypervisor.clone());

        let control_plane = ControlPlane::builder()
            .store(store.clone())
            .hypervisors(factory.clone())
            .config(config)
            .build()
            .unwrap();

        Self {
            store,
            factory,
            hypervisor,
            organization,
            default_project,
            zone,
            cluster,
            control_plane,
        }
    }

    /// Adds a node both remotely and locally.
    pub async fn node(&self, name: &str) -> Node {
        self.hypervisor.add_node(name);
        self.store.upsert_node(self.cluster.id, name).await.unwrap()
    }

    /// Persists an instance row with its boot disk, as a past pass would have.
    pub async fn local_instance(
        &self,
        node: &Node,
        vmid: u32,
        project_id: Uuid,
        status: InstanceStatus,
    ) -> Instance {
        let disk = self
            .store
            .upsert_boot_disk(BootDisk::new(Uuid::new_v4(), ssd(20)))
            .await
            .unwrap();
        self.store
            .save_instance(Instance::new(
                RemoteId::from_vmid(vmid),
                format!("vm-{}", vmid),
                node.id,
                project_id,
                disk.id,
                status,
            ))
            .await
            .unwrap()
    }

    pub async fn add_project(&self, name: &str) -> Project {
        let project = Project {
            id: Uuid::new_v4(),
            folder_id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.store.insert_project(project.clone()).await;
        project
    }

    pub async fn add_prices(&self, cpu: f64, ram: f64) {
        for (resource_type, price_per_unit) in [(PricedResource::Cpu, cpu), (PricedResource::Ram, ram)]
        {
            self.store
                .insert_price(Price {
                    id: Uuid::new_v4(),
                    zone_id: self.zone.id,
                    resource_type,
                    price_per_unit,
                })
                .await;
        }
    }
}

pub fn cluster_in(organization: &Organization, zone: &Zone, name: &str) -> Cluster {
    Cluster::proxmox(
        name,
        organization.id,
        zone.id,
        ClusterCredentials {
            host: format!("{}.example.com", name),
            token_id: "sync@pve!control-plane".to_string(),
            token_secret: "0b4c1d2e-secret".to_string(),
        },
    )
}
