use crate::core::domain::error::ValidationError;
use crate::lifecycle::application::request::create_instance_request::validate_instance_name;
use serde::Deserialize;
use uuid::Uuid;

/// Local-only changes to an instance. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstanceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
}

impl UpdateInstanceRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.name {
            Some(name) => validate_instance_name(name),
            None => Ok(()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.project_id.is_none()
    }
}
