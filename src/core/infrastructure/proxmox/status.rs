use crate::core::domain::{
    error::{ControlPlaneError, ControlPlaneResult},
    model::InstanceStatus,
};

/// Maps a Proxmox VM status to [`InstanceStatus`].
///
/// Only statuses with an unambiguous counterpart are accepted. Anything else
/// (`paused`, `suspended`, a new release's vocabulary) is an error.
pub fn normalize_status(raw: &str) -> ControlPlaneResult<InstanceStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "running" => Ok(InstanceStatus::Running),
        "stopped" => Ok(InstanceStatus::Stopped),
        _ => Err(ControlPlaneError::unrecognized("instance status", raw)),
    }
}
