//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use tracing::warn;

use crate::authn::jwt::DEV_SECRET;
use crate::deploy::orchestrator::DeployOptions;
use crate::storage::settings::Settings;
use crate::terminal::TerminalOptions;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Docker engine connection
    pub docker: DockerOptions,

    /// Deploy pipeline options
    pub deploy: DeployOptions,

    /// Deadline for one repository clone
    pub fetch_timeout: Duration,

    /// Terminal session options
    pub terminal: TerminalOptions,

    /// Application store document
    pub store_path: PathBuf,

    /// API token signing secret
    pub jwt_secret: SecretString,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(Settings::default())
    }
}

impl AppOptions {
    /// Map a settings document to runtime options
    pub fn from_settings(settings: Settings) -> Self {
        let jwt_secret = settings.auth.jwt_secret.unwrap_or_else(|| {
            warn!("No JWT secret configured, using the development secret");
            SecretString::from(DEV_SECRET.to_string())
        });

        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.server.host,
                port: settings.server.port,
            },
            docker: DockerOptions {
                connect_timeout: Duration::from_secs(settings.docker.connect_timeout_secs),
                request_timeout: Duration::from_secs(settings.docker.request_timeout_secs),
            },
            deploy: DeployOptions {
                workspace_dir: settings
                    .deploy
                    .workspace_dir
                    .unwrap_or_else(std::env::temp_dir),
                workspace_prefix: settings.deploy.workspace_prefix,
                container_prefix: settings.deploy.container_prefix,
                default_platform: settings.deploy.default_platform,
                retire_previous_container: settings.deploy.retire_previous_container,
            },
            fetch_timeout: Duration::from_secs(settings.deploy.fetch_timeout_secs),
            terminal: TerminalOptions {
                shell: settings.terminal.shell,
                write_timeout: Duration::from_secs(settings.terminal.write_timeout_secs),
                chunk_size: settings.terminal.chunk_size,
            },
            store_path: settings.store.path,
            jwt_secret,
        }
    }
}

/// Lifecycle options for the panel
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Docker engine connection options
#[derive(Debug, Clone)]
pub struct DockerOptions {
    /// Deadline for the startup ping
    pub connect_timeout: Duration,

    /// Deadline for each engine request
    pub request_timeout: Duration,
}

impl Default for DockerOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(1800),
        }
    }
}
