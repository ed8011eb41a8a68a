//! Image builder
//!
//! Wraps the engine build call. A build is only reported as successful once
//! the log stream has been drained and the engine's image list confirms the
//! requested tag exists; the build response alone is not trusted.

use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, error, info, warn};

use crate::deploy::package::BuildContext;
use crate::engine::{BuildEvent, BuildRequest, ContainerEngine};
use crate::errors::BuildError;
use crate::models::deployment::BuildOutcome;

/// Platform used for `BUILDPLATFORM`/`TARGETPLATFORM` when the caller gives none
pub const DEFAULT_PLATFORM: &str = "linux/amd64";

/// Union of caller and default build arguments; caller values win
pub fn merge_build_args(
    caller: &BTreeMap<String, String>,
    defaults: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = defaults.clone();
    merged.extend(caller.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Default platform build arguments
pub fn platform_build_args(platform: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("BUILDPLATFORM".to_string(), platform.to_string()),
        ("TARGETPLATFORM".to_string(), platform.to_string()),
    ])
}

pub struct ImageBuilder {
    engine: Arc<dyn ContainerEngine>,
    default_args: BTreeMap<String, String>,
}

impl ImageBuilder {
    pub fn new(engine: Arc<dyn ContainerEngine>, platform: &str) -> Self {
        Self {
            engine,
            default_args: platform_build_args(platform),
        }
    }

    /// Check that `dockerfile` names a file inside the source tree at `root`
    pub async fn verify_dockerfile(&self, root: &Path, dockerfile: &str) -> Result<(), BuildError> {
        let rel = Path::new(dockerfile);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if rel.as_os_str().is_empty() || escapes {
            return Err(BuildError::InvalidDockerfilePath(dockerfile.to_string()));
        }

        // Symlinks are left out of the build context, so a Dockerfile reached
        // through one would not be there when the engine looks for it.
        let mut path = root.to_path_buf();
        let mut components = rel.components().peekable();
        while let Some(component) = components.next() {
            path.push(component);
            let meta = match tokio::fs::symlink_metadata(&path).await {
                Ok(meta) => meta,
                Err(_) => return Err(dockerfile_missing(dockerfile)),
            };
            if meta.file_type().is_symlink() {
                warn!("Dockerfile {} is reached through a symlink", dockerfile);
                return Err(BuildError::InvalidDockerfilePath(dockerfile.to_string()));
            }
            let is_last = components.peek().is_none();
            if (is_last && !meta.is_file()) || (!is_last && !meta.is_dir()) {
                return Err(dockerfile_missing(dockerfile));
            }
        }

        Ok(())
    }

    /// Build `context` into an image tagged `tag`
    pub async fn build(
        &self,
        context: BuildContext,
        dockerfile: &str,
        tag: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<BuildOutcome, BuildError> {
        let request = BuildRequest {
            dockerfile: dockerfile.to_string(),
            tag: tag.to_string(),
            build_args: merge_build_args(build_args, &self.default_args),
        };

        let mut log = String::new();
        let mut events = self.engine.build_image(request, context);

        // Drain the whole stream before looking at the result
        while let Some(event) = events.next().await {
            match event {
                Ok(BuildEvent::Output(line)) => {
                    debug!(target: "build", "{}", line.trim_end());
                    log.push_str(&line);
                }
                Ok(BuildEvent::Error(message)) => {
                    warn!("Build of {} reported: {}", tag, message.trim_end());
                    log.push_str(&message);
                    if !message.ends_with('\n') {
                        log.push('\n');
                    }
                }
                Err(e) => {
                    error!("Build call for {} failed: {}", tag, e);
                    return Err(BuildError::EngineCall {
                        reason: e.to_string(),
                        log,
                    });
                }
            }
        }

        let exists = self
            .engine
            .image_exists(tag)
            .await
            .map_err(|e| BuildError::EngineCall {
                reason: format!("image lookup failed: {}", e),
                log: log.clone(),
            })?;

        if !exists {
            error!("Build finished but image {} does not exist", tag);
            return Err(BuildError::ImageNotProduced {
                tag: tag.to_string(),
                log,
            });
        }

        info!("Built image {}", tag);
        Ok(BuildOutcome {
            image_tag: tag.to_string(),
            log,
            verified: true,
        })
    }
}

fn dockerfile_missing(dockerfile: &str) -> BuildError {
    warn!("Dockerfile {} not found in source tree", dockerfile);
    BuildError::DockerfileMissing(dockerfile.to_string())
}
