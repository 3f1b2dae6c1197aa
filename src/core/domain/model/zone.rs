//! Placement zones and their unit prices.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A placement area grouping clusters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
}

/// Resource a price applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PricedResource {
    Cpu,
    Ram,
}

/// Hourly price of one unit of a resource in a zone.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Price {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub resource_type: PricedResource,
    pub price_per_unit: f64,
}
