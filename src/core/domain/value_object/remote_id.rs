use crate::core::domain::error::{ControlPlaneResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The hypervisor's own identifier for a VM (Proxmox `vmid`).
///
/// Stored and exchanged as a string of digits; kept numerically so that
/// ordering follows the vendor's numbering (`"99" < "105"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(u32);

impl RemoteId {
    /// Parses and validates a remote id.
    pub fn new(value: &str) -> ControlPlaneResult<Self> {
        validate_remote_id(value)?;
        Ok(Self(value.parse().map_err(|_| {
            ValidationError::ConstraintViolation(format!("Remote id {:?} is out of range", value))
        })?))
    }

    /// Wraps a numeric vmid as returned by the vendor API.
    #[must_use]
    pub fn from_vmid(vmid: u32) -> Self {
        Self(vmid)
    }

    /// Returns the numeric vmid.
    #[must_use]
    pub fn vmid(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = crate::ControlPlaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for RemoteId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_remote_id(&value)?;
        value.parse().map(Self).map_err(|_| {
            ValidationError::ConstraintViolation(format!("Remote id {:?} is out of range", value))
        })
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.to_string()
    }
}

/// Validates that a remote id is a non-empty string of ASCII digits.
pub(crate) fn validate_remote_id(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Field {
            field: "remote_id".to_string(),
            message: "Remote id cannot be empty".to_string(),
        });
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::Format(format!(
            "Remote id {:?} must only contain digits",
            value
        )));
    }
    Ok(())
}
