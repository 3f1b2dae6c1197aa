//! Domain model for hypervisor clusters.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The vendor behind a cluster's API. Selects the capability adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HypervisorVendor {
    Proxmox,
}

/// Connection material for a cluster.
///
/// Opaque to reconciliation and lifecycle logic: it is only handed to the
/// hypervisor factory.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterCredentials {
    /// `hostname`, `hostname:port` or a full URL.
    pub host: String,
    /// API token id (`user@realm!tokenname`).
    pub token_id: String,
    /// API token secret.
    #[serde(skip_serializing)]
    pub token_secret: String,
}

impl fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterCredentials")
            .field("host", &self.host)
            .field("token_id", &self.token_id)
            .field("token_secret", &"<redacted>")
            .finish()
    }
}

/// A named group of hypervisor nodes reachable through one set of credentials.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cluster {
    pub id: Uuid,
    pub name: String,
    pub organization_id: Uuid,
    pub zone_id: Uuid,
    pub vendor: HypervisorVendor,
    pub credentials: ClusterCredentials,
}

impl Cluster {
    /// Creates a Proxmox cluster with a fresh id.
    pub fn proxmox(
        name: impl Into<String>,
        organization_id: Uuid,
        zone_id: Uuid,
        credentials: ClusterCredentials,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            organization_id,
            zone_id,
            vendor: HypervisorVendor::Proxmox,
            credentials,
        }
    }
}
