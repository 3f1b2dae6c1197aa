//! Hypervisor reconciliation and instance lifecycle core of a cloud control plane.
//!
//! Keeps the persisted view of virtual machines consistent with what the
//! hypervisor clusters report, and mediates create/start/stop/delete calls
//! against them through a vendor-neutral [`HypervisorCapability`].

mod core;
mod lifecycle;
mod reconciliation;


pub use crate::core::{
    config::{ControlPlaneConfig, DEFAULT_PROJECT_NAME, RateLimitConfig},
    domain::{
        error::{ControlPlaneError, ControlPlaneResult, ValidationError},
        hypervisor::{
            HypervisorCapability, HypervisorFactory, InstanceCreateConfig, InstanceScope,
            NodeScope, RemoteInstance, RemoteInstanceConfig, RemoteNode,
        },
        model::{
            BootDisk, BootDiskSpec, Cluster, ClusterCredentials, DiskType, Folder,
            HypervisorVendor, Instance, InstanceFilter, InstanceStatus, Node, Organization, Page,
            Price, PricedResource, Project, Zone,
        },
        repository::{ControlPlaneStore, DefaultProjectResolver},
        value_object::{
            DEFAULT_PROXMOX_PORT, ProxmoxApiToken, ProxmoxHost, ProxmoxPort, ProxmoxUrl, RemoteId,
        },
    },
    infrastructure::{
        default_project_resolver::StoreDefaultProjectResolver,
        hypervisor_factory::VendorHypervisorFactory,
        memory_store::InMemoryStore,
        proxmox::disk_config::{DiskConfigParse, parse_boot_disk},
    },
};
pub use crate::lifecycle::application::{
    request::{
        create_instance_request::CreateInstanceRequest,
        update_instance_request::UpdateInstanceRequest,
    },
    response::instance_price::InstancePrice,
    service::instance_service::InstanceService,
};
pub use crate::reconciliation::application::{
    response::sync_report::{
        ClusterSyncReport, ClusterSyncResult, InstanceSyncAction, InstanceSyncResult,
        NodeSyncOutcome, NodeSyncReport,
    },
    service::synchronization_service::SynchronizationService,
};

use std::sync::Arc;

/// Entry point wiring the store, the hypervisor adapters and the services.
///
/// # Examples
///
/// ```no_run
/// use leeca_control_plane::{ControlPlane, ControlPlaneConfig, ControlPlaneResult, InMemoryStore};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> ControlPlaneResult<()> {
///     let control_plane = ControlPlane::builder()
///         .store(Arc::new(InMemoryStore::new()))
///         .config(ControlPlaneConfig::from_env()?)
///         .build()?;
///
///     for result in control_plane.synchronization().synchronize_all().await? {
///         if let Err(error) = result.outcome {
///             eprintln!("cluster {} failed: {}", result.cluster_id, error);
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct ControlPlane {
    synchronization: SynchronizationService,
    instances: InstanceService,
}

/// Builder for [`ControlPlane`].
///
/// Only the store is required. The hypervisor factory defaults to
/// [`VendorHypervisorFactory`] and the project resolver to
/// [`StoreDefaultProjectResolver`] over the same store.
#[derive(Default)]
pub struct ControlPlaneBuilder {
    store: Option<Arc<dyn ControlPlaneStore>>,
    hypervisors: Option<Arc<dyn HypervisorFactory>>,
    projects: Option<Arc<dyn DefaultProjectResolver>>,
    config: ControlPlaneConfig,
}

impl ControlPlaneBuilder {
    pub fn store(mut self, store: Arc<dyn ControlPlaneStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn hypervisors(mut self, hypervisors: Arc<dyn HypervisorFactory>) -> Self {
        self.hypervisors = Some(hypervisors);
        self
    }

    pub fn project_resolver(mut self, projects: Arc<dyn DefaultProjectResolver>) -> Self {
        self.projects = Some(projects);
        self
    }

    pub fn config(mut self, config: ControlPlaneConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ControlPlaneResult<ControlPlane> {
        self.config.validate()?;
        let store = self.store.ok_or_else(|| ValidationError::Field {
            field: "store".to_string(),
            message: "A store is required".to_string(),
        })?;

        let config = self.config;
        let hypervisors: Arc<dyn HypervisorFactory> = match self.hypervisors {
            Some(hypervisors) => hypervisors,
            None => Arc::new(VendorHypervisorFactory::new(config.clone())),
        };
        let projects: Arc<dyn DefaultProjectResolver> = match self.projects {
            Some(projects) => projects,
            None => Arc::new(StoreDefaultProjectResolver::new(Arc::clone(&store), &config)),
        };

        Ok(ControlPlane {
            synchronization: SynchronizationService::new(
                Arc::clone(&store),
                Arc::clone(&hypervisors),
                Arc::clone(&projects),
                &config,
            ),
            instances: InstanceService::new(store, hypervisors, projects, &config),
        })
    }
}

impl ControlPlane {
    pub fn builder() -> ControlPlaneBuilder {
        ControlPlaneBuilder::default()
    }

    /// Reconciliation of stored instances with the hypervisors.
    pub fn synchronization(&self) -> &SynchronizationService {
        &self.synchronization
    }

    /// Instance lifecycle operations.
    pub fn instances(&self) -> &InstanceService {
        &self.instances
    }
}
