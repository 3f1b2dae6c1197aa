//! Wire shapes of the Proxmox VE endpoints the adapter calls.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A node as returned by `GET /nodes`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NodeListItem {
    pub node: String,
    /// `online`, `offline` or `unknown`.
    #[serde(default)]
    pub status: Option<String>,
}

/// A VM as returned by `GET /nodes/{node}/qemu`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VmListItem {
    #[serde(deserialize_with = "number_or_string")]
    pub vmid: String,
    /// Unset for VMs created without a name.
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
}

/// Runtime status from `GET /nodes/{node}/qemu/{vmid}/status/current`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VmStatusCurrent {
    pub status: String,
}

/// Body of `POST /nodes/{node}/qemu`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateVmParams {
    pub vmid: u32,
    pub name: String,
    pub cores: u32,
    /// MiB.
    pub memory: u32,
    pub ostype: String,
    pub scsihw: String,
    pub scsi0: String,
    pub boot: String,
}

/// `GET /cluster/nextid` answers with a string; older releases send a number.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct NextId(#[serde(deserialize_with = "number_or_string")] pub String);

/// Flattens `GET /nodes/{node}/qemu/{vmid}/config` to `key -> text`.
///
/// Values are mixed strings and numbers on the wire.
pub fn flatten_config(raw: BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    raw.into_iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect()
}

fn number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Number(n) => n.to_string(),
        Raw::Text(s) => s,
    })
}
