//! Application record persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::filesys::file::File;
use crate::models::application::{AppId, ApplicationRecord};

/// Persistence collaborator for application records
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Look up one application
    async fn get(&self, id: AppId) -> Result<Option<ApplicationRecord>, StoreError>;

    /// Record the image and container produced by a successful deploy
    async fn record_deployment(
        &self,
        id: AppId,
        image: &str,
        container_id: &str,
    ) -> Result<(), StoreError>;
}

/// On-disk document layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct ApplicationsDocument {
    #[serde(default)]
    applications: Vec<ApplicationRecord>,
}

/// Store keeping every record in one JSON document.
///
/// Writes go through [`File::write_json`], so readers never observe a half
/// written document. The mutex serializes read-modify-write cycles within
/// the process.
pub struct JsonApplicationStore {
    file: File,
    lock: Mutex<()>,
}

impl JsonApplicationStore {
    pub fn new(file: File) -> Self {
        Self {
            file,
            lock: Mutex::new(()),
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    async fn load(&self) -> Result<ApplicationsDocument, StoreError> {
        Ok(self.file.read_json_opt().await?.unwrap_or_default())
    }
}

#[async_trait]
impl ApplicationStore for JsonApplicationStore {
    async fn get(&self, id: AppId) -> Result<Option<ApplicationRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        Ok(doc.applications.into_iter().find(|a| a.id == id))
    }

    async fn record_deployment(
        &self,
        id: AppId,
        image: &str,
        container_id: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;

        let record = doc
            .applications
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound(id))?;
        debug!(
            "Application {}: image {} -> {}",
            id, record.image, image
        );
        record.image = image.to_string();
        record.container_id = Some(container_id.to_string());

        self.file.write_json(&doc).await?;
        info!("Recorded deployment of application {}", id);
        Ok(())
    }
}
