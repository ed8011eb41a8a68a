//! Deployment models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dockerfile location used when a deploy does not name one
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Everything one deploy attempt needs to know about its source and runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySpec {
    /// Remote repository URL
    pub source_url: String,

    /// Branch to clone; `None` or empty selects the remote's default branch
    #[serde(default)]
    pub branch: Option<String>,

    /// Dockerfile path relative to the repository root
    #[serde(default)]
    pub dockerfile_path: Option<String>,

    /// Container environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Mirrored bind mounts (host path == container path)
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Caller-supplied build arguments
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
}

impl DeploySpec {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            ..Default::default()
        }
    }

    /// Branch to fetch, with empty strings treated as unset
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref().map(str::trim).filter(|b| !b.is_empty())
    }

    /// Dockerfile path, falling back to the repository root
    pub fn dockerfile(&self) -> &str {
        self.dockerfile_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_DOCKERFILE)
    }
}

/// Commit checked out by a fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRef(pub String);

impl std::fmt::Display for CommitRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a verified image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub image_tag: String,
    pub log: String,
    pub verified: bool,
}

/// A container that was created and started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningContainer {
    pub id: String,
    pub name: String,
}

/// Result of a successful deploy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOutcome {
    pub image_tag: String,
    pub container_id: String,
    pub commit: CommitRef,
}
