//! Container launcher

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::engine::{ContainerEngine, ContainerSpec};
use crate::errors::RunError;
use crate::models::deployment::RunningContainer;

/// Label carrying the owning application id
pub const APP_ID_LABEL: &str = "gakwaya.panel.app-id";

pub struct ContainerLauncher {
    engine: Arc<dyn ContainerEngine>,
}

impl ContainerLauncher {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// Create and start a container from `image`.
    ///
    /// If the start fails the created container is removed again before the
    /// error is returned.
    pub async fn run(
        &self,
        image: &str,
        env: &BTreeMap<String, String>,
        volumes: &[String],
        name: &str,
        labels: BTreeMap<String, String>,
    ) -> Result<RunningContainer, RunError> {
        let spec = ContainerSpec {
            name: name.to_string(),
            image: image.to_string(),
            env: env_entries(env),
            binds: mirrored_binds(volumes)?,
            labels,
        };

        let id = self
            .engine
            .create_container(&spec)
            .await
            .map_err(|e| RunError::CreateFailed(e.to_string()))?;
        info!("Created container {} ({})", name, id);

        if let Err(e) = self.engine.start_container(&id).await {
            warn!("Failed to start container {}: {}", id, e);
            if let Err(remove_err) = self.engine.remove_container(&id).await {
                warn!(
                    "Failed to remove container {} after failed start: {}",
                    id, remove_err
                );
            }
            return Err(RunError::StartFailed {
                container_id: id,
                reason: e.to_string(),
            });
        }

        info!("Started container {} ({})", name, id);
        Ok(RunningContainer {
            id,
            name: name.to_string(),
        })
    }
}

/// `KEY=VALUE` entries in key order
pub fn env_entries(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}

/// Turn volume specs into `(source, target)` pairs with identical paths.
///
/// Duplicates keep their first position.
pub fn mirrored_binds(volumes: &[String]) -> Result<Vec<(String, String)>, RunError> {
    let mut seen = HashSet::new();
    let mut binds = Vec::new();

    for volume in volumes {
        let volume = volume.trim();
        if volume.is_empty() || volume.contains(':') {
            return Err(RunError::InvalidVolume(volume.to_string()));
        }
        if seen.insert(volume) {
            binds.push((volume.to_string(), volume.to_string()));
        }
    }

    Ok(binds)
}
