//! Deployment orchestrator
//!
//! Runs one deploy attempt through `Workspace -> Fetch -> Pack -> Build ->
//! Run -> Persist`. A failing stage stops the attempt; only `Persist` touches
//! the stored record, and only after the new container has started.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::deploy::builder::{ImageBuilder, DEFAULT_PLATFORM};
use crate::deploy::fsm::{DeployFsm, DeployStage};
use crate::deploy::git::SourceFetcher;
use crate::deploy::launcher::{mirrored_binds, ContainerLauncher, APP_ID_LABEL};
use crate::deploy::package;
use crate::deploy::tagger::ImageTagger;
use crate::deploy::workspace::Workspace;
use crate::engine::ContainerEngine;
use crate::errors::DeployError;
use crate::models::application::{AppId, ApplicationRecord};
use crate::models::deployment::{DeployOutcome, DeploySpec};
use crate::storage::applications::ApplicationStore;

/// Deploy options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Parent directory of per-attempt workspaces
    pub workspace_dir: PathBuf,

    /// Workspace directory name prefix
    pub workspace_prefix: String,

    /// Container name prefix
    pub container_prefix: String,

    /// Platform for the default build arguments
    pub default_platform: String,

    /// Remove the application's previous container after a successful deploy
    pub retire_previous_container: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            workspace_dir: std::env::temp_dir(),
            workspace_prefix: "gakwayapanel-app".to_string(),
            container_prefix: "gakwayapanel-app".to_string(),
            default_platform: DEFAULT_PLATFORM.to_string(),
            retire_previous_container: true,
        }
    }
}

/// One async mutex per application id
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: StdMutex<HashMap<AppId, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn lock(&self, id: AppId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // drop entries nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked ids
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Orchestrator {
    engine: Arc<dyn ContainerEngine>,
    fetcher: Arc<dyn SourceFetcher>,
    store: Arc<dyn ApplicationStore>,
    builder: ImageBuilder,
    launcher: ContainerLauncher,
    options: DeployOptions,
    locks: KeyedLocks,
    tagger: ImageTagger,
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn ApplicationStore>,
        options: DeployOptions,
    ) -> Self {
        Self {
            builder: ImageBuilder::new(engine.clone(), &options.default_platform),
            launcher: ContainerLauncher::new(engine.clone()),
            engine,
            fetcher,
            store,
            options,
            locks: KeyedLocks::new(),
            tagger: ImageTagger::new(),
        }
    }

    /// Deploy `spec` as the new version of application `app_id`.
    ///
    /// Attempts for the same application run one at a time.
    pub async fn deploy(
        &self,
        app_id: AppId,
        spec: &DeploySpec,
    ) -> Result<DeployOutcome, DeployError> {
        let _guard = self.locks.lock(app_id).await;

        let record = self
            .store
            .get(app_id)
            .await
            .map_err(DeployError::Lookup)?
            .ok_or(DeployError::ApplicationNotFound(app_id))?;

        // caller errors that need no clone or build to detect
        mirrored_binds(&spec.volumes)?;

        info!(
            "Deploying application {} from {} (branch: {})",
            app_id,
            spec.source_url,
            spec.branch().unwrap_or("<default>")
        );

        let mut fsm = DeployFsm::new();
        let mut workspace = None;
        let result = self
            .run_stages(app_id, spec, &mut fsm, &mut workspace)
            .await;

        if let Some(mut workspace) = workspace {
            if let Err(e) = workspace.release().await {
                warn!(
                    "Failed to release workspace {}: {}",
                    workspace.path().display(),
                    e
                );
            }
        }

        match result {
            Ok(outcome) => {
                info!(
                    "Application {} deployed: image {}, container {}, commit {}",
                    app_id, outcome.image_tag, outcome.container_id, outcome.commit
                );
                self.retire_previous(&record, &outcome.container_id).await;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(transition) = fsm.fail(e.to_string()) {
                    warn!("Deploy of application {}: {}", app_id, transition);
                }
                let failed_at = fsm
                    .failed_at()
                    .map(|stage| stage.to_string())
                    .unwrap_or_else(|| e.stage().to_string());
                error!(
                    "Deploy of application {} failed at {}: {}",
                    app_id, failed_at, e
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        app_id: AppId,
        spec: &DeploySpec,
        fsm: &mut DeployFsm,
        workspace: &mut Option<Workspace>,
    ) -> Result<DeployOutcome, DeployError> {
        advance(fsm, DeployStage::Workspace)?;
        let workspace = workspace.insert(
            Workspace::acquire(&self.options.workspace_dir, &self.options.workspace_prefix)
                .await
                .map_err(DeployError::Workspace)?,
        );
        let source_root = workspace.path().to_path_buf();

        advance(fsm, DeployStage::Fetch)?;
        let commit = self
            .fetcher
            .fetch(&spec.source_url, spec.branch(), &source_root)
            .await?;

        advance(fsm, DeployStage::Pack)?;
        let dockerfile = spec.dockerfile();
        // checked before any engine call
        self.builder
            .verify_dockerfile(&source_root, dockerfile)
            .await?;
        let context = package::pack(&source_root).await?;

        advance(fsm, DeployStage::Build)?;
        let (tag, stamp) = self.tagger.next_tag(app_id);
        let build = self
            .builder
            .build(context, dockerfile, &tag, &spec.build_args)
            .await?;

        advance(fsm, DeployStage::Run)?;
        let name = format!("{}-{}-{}", self.options.container_prefix, app_id, stamp);
        let labels = BTreeMap::from([(APP_ID_LABEL.to_string(), app_id.to_string())]);
        let container = self
            .launcher
            .run(&build.image_tag, &spec.env, &spec.volumes, &name, labels)
            .await?;

        advance(fsm, DeployStage::Persist)?;
        if let Err(e) = self
            .store
            .record_deployment(app_id, &build.image_tag, &container.id)
            .await
        {
            warn!(
                "Removing container {} after failing to record it: {}",
                container.id, e
            );
            if let Err(remove_err) = self.engine.remove_container(&container.id).await {
                warn!("Failed to remove container {}: {}", container.id, remove_err);
            }
            return Err(DeployError::Persist(e));
        }

        advance(fsm, DeployStage::Done)?;
        Ok(DeployOutcome {
            image_tag: build.image_tag,
            container_id: container.id,
            commit,
        })
    }

    async fn retire_previous(&self, record: &ApplicationRecord, new_container: &str) {
        if !self.options.retire_previous_container {
            return;
        }
        let Some(previous) = record.container_id.as_deref() else {
            return;
        };
        if previous.is_empty() || previous == new_container {
            return;
        }

        match self.engine.remove_container(previous).await {
            Ok(()) => info!(
                "Removed previous container {} of application {}",
                previous, record.id
            ),
            Err(e) => warn!(
                "Failed to remove previous container {} of application {}: {}",
                previous, record.id, e
            ),
        }
    }
}

/// Move `fsm` into `stage`, aborting the attempt on an out-of-order step
fn advance(fsm: &mut DeployFsm, stage: DeployStage) -> Result<(), DeployError> {
    fsm.enter(stage).map_err(DeployError::Sequence)?;
    debug!("Deploy stage: {}", stage);
    Ok(())
}
