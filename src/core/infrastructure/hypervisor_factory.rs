use crate::core::{
    config::ControlPlaneConfig,
    domain::{
        error::ControlPlaneResult,
        hypervisor::{HypervisorCapability, HypervisorFactory},
        model::{Cluster, HypervisorVendor},
        value_object::{ProxmoxApiToken, ProxmoxUrl},
    },
    infrastructure::{api_client::ApiClient, proxmox::ProxmoxHypervisor},
};
use std::sync::Arc;
use tracing::debug;

/// Builds the adapter matching a cluster's vendor from its stored credentials.
#[derive(Debug, Clone, Default)]
pub struct VendorHypervisorFactory {
    config: ControlPlaneConfig,
}

impl VendorHypervisorFactory {
    pub fn new(config: ControlPlaneConfig) -> Self {
        Self { config }
    }
}

impl HypervisorFactory for VendorHypervisorFactory {
    fn for_cluster(&self, cluster: &Cluster) -> ControlPlaneResult<Arc<dyn HypervisorCapability>> {
        match cluster.vendor {
            HypervisorVendor::Proxmox => {
                let credentials = &cluster.credentials;
                let url = ProxmoxUrl::from_cluster_host(&credentials.host)?;
                let token =
                    ProxmoxApiToken::new(&credentials.token_id, &credentials.token_secret)?;
                debug!(cluster = %cluster.id, url = %url.as_str(), "building proxmox adapter");

                let client = ApiClient::new(url, token, &self.config)?;
                Ok(Arc::new(ProxmoxHypervisor::new(
                    client,
                    cluster.id,
                    &self.config,
                )))
            }
        }
    }
}
