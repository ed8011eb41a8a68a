//! Docker Engine API implementation

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::{BuildImageOptions, ListImagesOptions};
use bollard::models::{
    BuildInfo, HostConfig, Mount, MountTypeEnum, RestartPolicy, RestartPolicyNameEnum,
};
use bollard::Docker;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::deploy::package::BuildContext;
use crate::engine::{BuildEvent, BuildRequest, ContainerEngine, ContainerSpec, ExecChannel};
use crate::errors::EngineError;

const BUILD_EVENT_BUFFER: usize = 64;

/// Docker engine client
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect using `DOCKER_HOST` or the platform default socket.
    ///
    /// `request_timeout` bounds every API call, including image builds, so it
    /// has to cover the slowest expected build.
    pub fn connect(request_timeout: Duration) -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()?.with_timeout(request_timeout);
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await?;
        Ok(())
    }

    fn build_image(
        &self,
        request: BuildRequest,
        context: BuildContext,
    ) -> BoxStream<'static, Result<BuildEvent, EngineError>> {
        info!(
            "Building image {} from {} ({} bytes of context)",
            request.tag,
            request.dockerfile,
            context.len()
        );

        let options = BuildImageOptions {
            dockerfile: request.dockerfile,
            t: request.tag,
            rm: true,
            buildargs: request.build_args.into_iter().collect::<HashMap<_, _>>(),
            ..Default::default()
        };

        // The bollard stream borrows the client, so it is drained in its own
        // task and forwarded through a bounded channel.
        let docker = self.docker.clone();
        let body = context.into_bytes();
        let (tx, rx) = mpsc::channel(BUILD_EVENT_BUFFER);
        tokio::spawn(async move {
            let mut stream = std::pin::pin!(docker.build_image(options, None, Some(body.into())));
            while let Some(item) = stream.next().await {
                let event = item.map(build_event).map_err(EngineError::from);
                if tx.send(event).await.is_err() {
                    debug!("Build stream receiver dropped");
                    break;
                }
            }
        });

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed()
    }

    async fn image_exists(&self, tag: &str) -> Result<bool, EngineError> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![tag.to_string()]);

        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await?;

        Ok(images
            .iter()
            .any(|image| image.repo_tags.iter().any(|t| t == tag)))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let mounts: Vec<Mount> = spec
            .binds
            .iter()
            .map(|(source, target)| Mount {
                typ: Some(MountTypeEnum::BIND),
                source: Some(source.clone()),
                target: Some(target.clone()),
                ..Default::default()
            })
            .collect();

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone().into_iter().collect()),
            host_config: Some(HostConfig {
                mounts: if mounts.is_empty() { None } else { Some(mounts) },
                restart_policy: Some(RestartPolicy {
                    name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                    maximum_retry_count: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self.docker.create_container(Some(options), config).await?;
        for warning in &response.warnings {
            debug!("Container create warning: {}", warning);
        }
        Ok(response.id)
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn create_exec(&self, container_id: &str, cmd: &[String]) -> Result<String, EngineError> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            env: Some(vec!["TERM=xterm-256color".to_string()]),
            attach_stdin: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(true),
            ..Default::default()
        };

        let exec = self.docker.create_exec(container_id, options).await?;
        Ok(exec.id)
    }

    async fn attach_exec(&self, exec_id: &str) -> Result<ExecChannel, EngineError> {
        let options = StartExecOptions {
            detach: false,
            tty: true,
            ..Default::default()
        };

        match self.docker.start_exec(exec_id, Some(options)).await? {
            StartExecResults::Attached { output, input } => Ok(ExecChannel {
                output: output
                    .map(|item| {
                        item.map(|chunk| chunk.into_bytes().to_vec())
                            .map_err(EngineError::from)
                    })
                    .boxed(),
                input,
            }),
            StartExecResults::Detached => Err(EngineError::Unexpected(
                "exec session started detached".to_string(),
            )),
        }
    }
}

fn build_event(info: BuildInfo) -> BuildEvent {
    if let Some(error) = info.error {
        return BuildEvent::Error(error);
    }
    BuildEvent::Output(info.stream.or(info.status).unwrap_or_default())
}
