//! Container engine abstraction
//!
//! Everything the deploy pipeline and the terminal bridge need from a
//! container engine goes through [`ContainerEngine`]. The production
//! implementation talks to the Docker Engine API ([`docker::DockerEngine`]).

pub mod docker;

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::AsyncWrite;

use crate::deploy::package::BuildContext;
use crate::errors::EngineError;

/// Parameters of one image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Dockerfile path inside the build context
    pub dockerfile: String,

    /// Tag the resulting image must carry
    pub tag: String,

    /// Final build arguments (defaults already merged)
    pub build_args: BTreeMap<String, String>,
}

/// One event from a build log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEvent {
    /// Regular build output
    Output(String),

    /// An error the engine reported inside the stream
    Error(String),
}

/// Container creation parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,

    /// `KEY=VALUE` entries
    pub env: Vec<String>,

    /// Bind mounts as `(source, target)`
    pub binds: Vec<(String, String)>,

    pub labels: BTreeMap<String, String>,
}

/// Duplex byte channel attached to an exec session
pub struct ExecChannel {
    /// Output read from the session's pseudo-terminal
    pub output: BoxStream<'static, Result<Vec<u8>, EngineError>>,

    /// Input written to the session's pseudo-terminal
    pub input: Pin<Box<dyn AsyncWrite + Send>>,
}

impl std::fmt::Debug for ExecChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecChannel").finish_non_exhaustive()
    }
}

/// Container engine operations used by the panel
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check the engine is reachable
    async fn ping(&self) -> Result<(), EngineError>;

    /// Submit a build. The returned stream must be drained to complete it.
    fn build_image(
        &self,
        request: BuildRequest,
        context: BuildContext,
    ) -> BoxStream<'static, Result<BuildEvent, EngineError>>;

    /// Whether an image with exactly this tag exists
    async fn image_exists(&self, tag: &str) -> Result<bool, EngineError>;

    /// Create a container, returning its ID
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    /// Force-remove a container
    async fn remove_container(&self, id: &str) -> Result<(), EngineError>;

    /// Create a TTY exec session running `cmd`, returning the exec ID
    async fn create_exec(&self, container_id: &str, cmd: &[String]) -> Result<String, EngineError>;

    /// Start an exec session and attach to its pseudo-terminal
    async fn attach_exec(&self, exec_id: &str) -> Result<ExecChannel, EngineError>;
}
