//! Domain model for hypervisor hosts.

use crate::core::domain::value_object::serde_helpers::system_time_millis;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// One hypervisor host within a cluster.
///
/// The vendor addresses the host by `name`; the natural key is
/// `(cluster_id, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Node {
    pub id: Uuid,
    pub cluster_id: Uuid,
    pub name: String,
    #[serde(with = "system_time_millis")]
    pub created_at: SystemTime,
    #[serde(with = "system_time_millis")]
    pub updated_at: SystemTime,
}

impl Node {
    pub fn new(cluster_id: Uuid, name: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            cluster_id,
            name: name.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
