//! Application record models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Application identifier
pub type AppId = i64;

/// An application as held by the persistence collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    /// Unique application ID
    pub id: AppId,

    /// Display name
    pub name: String,

    /// Latest deployed image tag
    #[serde(default)]
    pub image: String,

    /// Container started from `image`, if any
    #[serde(default)]
    pub container_id: Option<String>,

    /// Stored environment, used when a deploy request carries none
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Mirrored bind mounts
    #[serde(default)]
    pub volumes: Vec<String>,

    /// Build arguments
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,

    /// Dockerfile path relative to the repository root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_path: Option<String>,

    /// Source repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,

    /// Source branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl ApplicationRecord {
    pub fn new(id: AppId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }
}
