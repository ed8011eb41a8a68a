//! Application state management

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::authn::jwt::TokenVerifier;
use crate::deploy::git::{GitCliFetcher, SourceFetcher};
use crate::deploy::orchestrator::{DeployOptions, Orchestrator};
use crate::engine::docker::DockerEngine;
use crate::engine::ContainerEngine;
use crate::errors::PanelError;
use crate::filesys::file::File;
use crate::storage::applications::{ApplicationStore, JsonApplicationStore};
use crate::terminal::{TerminalBridge, TerminalOptions};

/// Main application state
pub struct AppState {
    pub engine: Arc<dyn ContainerEngine>,
    pub store: Arc<dyn ApplicationStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub bridge: Arc<TerminalBridge>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire the shared components around the given collaborators
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        fetcher: Arc<dyn SourceFetcher>,
        store: Arc<dyn ApplicationStore>,
        deploy: DeployOptions,
        terminal: TerminalOptions,
        jwt_secret: SecretString,
    ) -> Self {
        let orchestrator = Arc::new(Orchestrator::new(
            engine.clone(),
            fetcher,
            store.clone(),
            deploy,
        ));
        let bridge = Arc::new(TerminalBridge::new(engine.clone(), terminal));

        Self {
            engine,
            store,
            orchestrator,
            bridge,
            verifier: Arc::new(TokenVerifier::new(jwt_secret)),
        }
    }

    /// Initialize application state from runtime options
    pub async fn init(options: &AppOptions) -> Result<Self, PanelError> {
        info!("Initializing application state...");

        let engine = DockerEngine::connect(options.docker.request_timeout)?;
        match tokio::time::timeout(options.docker.connect_timeout, engine.ping()).await {
            Ok(Ok(())) => info!("Docker engine reachable"),
            Ok(Err(e)) => warn!("Docker engine ping failed: {}", e),
            Err(_) => warn!(
                "Docker engine ping timed out after {:?}",
                options.docker.connect_timeout
            ),
        }

        let store = JsonApplicationStore::new(File::new(options.store_path.clone()));
        info!("Using application store {}", store.file().path().display());

        Ok(Self::new(
            Arc::new(engine),
            Arc::new(GitCliFetcher::new(options.fetch_timeout)),
            Arc::new(store),
            options.deploy.clone(),
            options.terminal.clone(),
            SecretString::from(options.jwt_secret.expose_secret().to_string()),
        ))
    }
}
