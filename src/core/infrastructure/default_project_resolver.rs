use crate::core::{
    config::ControlPlaneConfig,
    domain::{
        error::{ControlPlaneError, ControlPlaneResult},
        model::Cluster,
        repository::{ControlPlaneStore, DefaultProjectResolver},
    },
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Resolves Cluster → Organization → Folder → Project through the store,
/// matching the folder and the project by their configured default names.
pub struct StoreDefaultProjectResolver {
    store: Arc<dyn ControlPlaneStore>,
    folder_name: String,
    project_name: String,
}

impl StoreDefaultProjectResolver {
    pub fn new(store: Arc<dyn ControlPlaneStore>, config: &ControlPlaneConfig) -> Self {
        Self {
            store,
            folder_name: config.default_folder_name.clone(),
            project_name: config.default_project_name.clone(),
        }
    }
}

#[async_trait]
impl DefaultProjectResolver for StoreDefaultProjectResolver {
    async fn default_project(&self, cluster: &Cluster) -> ControlPlaneResult<Uuid> {
        let folder = self
            .store
            .find_folder_by_name(cluster.organization_id, &self.folder_name)
            .await?
            .ok_or_else(|| {
                ControlPlaneError::not_found(
                    "Folder",
                    format!("{} in organization {}", self.folder_name, cluster.organization_id),
                )
            })?;

        let project = self
            .store
            .find_project_by_name(folder.id, &self.project_name)
            .await?
            .ok_or_else(|| {
                ControlPlaneError::not_found(
                    "Project",
                    format!("{} in folder {}", self.project_name, folder.id),
                )
            })?;

        debug!(cluster = %cluster.id, project = %project.id, "resolved default project");
        Ok(project.id)
    }
}
