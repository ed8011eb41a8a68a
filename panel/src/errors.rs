//! Error types for the Gakwaya panel

use std::path::PathBuf;

use thiserror::Error;

use crate::models::application::AppId;

/// Process-level error type for the panel
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Container engine error: {0}")]
    EngineError(#[from] EngineError),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Deployment error: {0}")]
    DeployError(#[from] DeployError),

    #[error("Terminal session error: {0}")]
    SessionError(#[from] SessionError),

    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Errors surfaced by the container engine seam
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("Unexpected engine response: {0}")]
    Unexpected(String),
}

/// Errors surfaced by the application store seam
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Application {0} not found")]
    NotFound(AppId),
}

/// Source fetch failures
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("Repository unreachable: {0}")]
    Unreachable(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Destination unusable: {0}")]
    Destination(String),
}

/// Build context packaging failures
#[derive(Error, Debug)]
pub enum PackError {
    #[error("Failed to walk {path}: {reason}")]
    Walk { path: PathBuf, reason: String },

    #[error("Failed to archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Packaging task failed: {0}")]
    Task(String),
}

/// Image build failures
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Dockerfile not found at {0}")]
    DockerfileMissing(String),

    #[error("Invalid Dockerfile path: {0}")]
    InvalidDockerfilePath(String),

    #[error("Image build call failed: {reason}")]
    EngineCall { reason: String, log: String },

    #[error("Image {tag} was not produced by the build")]
    ImageNotProduced { tag: String, log: String },
}

impl BuildError {
    /// Build log captured before the failure, if any
    pub fn log(&self) -> Option<&str> {
        match self {
            BuildError::EngineCall { log, .. } | BuildError::ImageNotProduced { log, .. } => {
                Some(log.as_str())
            }
            _ => None,
        }
    }
}

/// Container launch failures
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Invalid volume spec '{0}': host and container paths must be the same single path")]
    InvalidVolume(String),

    #[error("Failed to create container: {0}")]
    CreateFailed(String),

    #[error("Failed to start container {container_id}: {reason}")]
    StartFailed { container_id: String, reason: String },
}

/// Stage-tagged deploy failure
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Application {0} not found")]
    ApplicationNotFound(AppId),

    #[error("Application lookup failed: {0}")]
    Lookup(#[source] StoreError),

    #[error("Workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Pack error: {0}")]
    Pack(#[from] PackError),

    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("Run error: {0}")]
    Run(#[from] RunError),

    #[error("Persist error: {0}")]
    Persist(#[source] StoreError),

    #[error("Deploy sequence error: {0}")]
    Sequence(String),
}

impl DeployError {
    /// Name of the pipeline stage that produced this error
    pub fn stage(&self) -> &'static str {
        match self {
            DeployError::ApplicationNotFound(_) | DeployError::Lookup(_) => "lookup",
            DeployError::Workspace(_) => "workspace",
            DeployError::Fetch(_) => "fetch",
            DeployError::Pack(_) => "pack",
            DeployError::Build(_) => "build",
            DeployError::Run(_) => "run",
            DeployError::Persist(_) => "persist",
            DeployError::Sequence(_) => "sequence",
        }
    }

    /// Captured build log for build failures
    pub fn build_log(&self) -> Option<&str> {
        match self {
            DeployError::Build(e) => e.log(),
            _ => None,
        }
    }

    /// Whether the failure was caused by the request rather than the system
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DeployError::Fetch(FetchError::InvalidUrl(_))
                | DeployError::Build(BuildError::DockerfileMissing(_))
                | DeployError::Build(BuildError::InvalidDockerfilePath(_))
                | DeployError::Run(RunError::InvalidVolume(_))
        )
    }
}

/// Terminal session failures
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to create exec: {0}")]
    CreateExec(String),

    #[error("Failed to attach exec: {0}")]
    Attach(String),

    #[error("Relay I/O error: {0}")]
    RelayIo(String),
}

/// Request authentication failures
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing or invalid Authorization header")]
    MissingToken,

    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),
}
