use crate::core::domain::{
    error::ValidationError,
    model::{BootDiskSpec, DiskType},
};
use serde::Deserialize;
use uuid::Uuid;

const MAX_NAME_LENGTH: usize = 63;
const MIN_MEMORY_MB: u32 = 16;

/// Input of `InstanceService::create`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    pub zone_id: Uuid,
    pub name: String,
    /// Owner project; the cluster's default project when absent.
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default = "default_cores")]
    pub cores: u32,
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,
    #[serde(default = "default_disk_size_gb")]
    pub disk_size_gb: u32,
    #[serde(default = "default_disk_type")]
    pub disk_type: DiskType,
    /// Proxmox `ostype` (e.g. `l26`, `win11`).
    #[serde(default = "default_os")]
    pub os: String,
}

fn default_cores() -> u32 {
    1
}

fn default_memory_mb() -> u32 {
    1024
}

fn default_disk_size_gb() -> u32 {
    32
}

fn default_disk_type() -> DiskType {
    DiskType::Hdd
}

fn default_os() -> String {
    "l26".to_string()
}

impl CreateInstanceRequest {
    /// A request with the default sizing: 1 core, 1 GiB RAM, 32 GiB HDD, Linux.
    pub fn new(zone_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            zone_id,
            name: name.into(),
            project_id: None,
            cores: default_cores(),
            memory_mb: default_memory_mb(),
            disk_size_gb: default_disk_size_gb(),
            disk_type: default_disk_type(),
            os: default_os(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_instance_name(&self.name)?;
        if self.cores == 0 {
            return Err(field("cores", "must be at least 1"));
        }
        if self.memory_mb < MIN_MEMORY_MB {
            return Err(field(
                "memoryMb",
                &format!("must be at least {} MiB", MIN_MEMORY_MB),
            ));
        }
        if self.disk_size_gb == 0 {
            return Err(field("diskSizeGb", "must be at least 1"));
        }
        if self.os.trim().is_empty() {
            return Err(field("os", "cannot be empty"));
        }
        Ok(())
    }

    pub(crate) fn boot_disk(&self) -> BootDiskSpec {
        BootDiskSpec {
            os: self.os.trim().to_string(),
            size_gb: self.disk_size_gb,
            disk_type: self.disk_type,
        }
    }
}

/// Proxmox only accepts DNS-style VM names.
pub(crate) fn validate_instance_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(field("name", "cannot be empty"));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(field(
            "name",
            &format!("cannot exceed {} characters", MAX_NAME_LENGTH),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'))
    {
        return Err(ValidationError::Format(format!(
            "Instance name {:?} may only contain alphanumerics, '-' and '.'",
            name
        )));
    }
    if name.starts_with(['-', '.']) || name.ends_with(['-', '.']) {
        return Err(ValidationError::Format(format!(
            "Instance name {:?} must start and end with an alphanumeric",
            name
        )));
    }
    Ok(())
}

fn field(name: &str, message: &str) -> ValidationError {
    ValidationError::Field {
        field: name.to_string(),
        message: message.to_string(),
    }
}
