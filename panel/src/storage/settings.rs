//! Settings file management

use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::logs::LogLevel;

/// Panel settings
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Directory for daily rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub docker: DockerSettings,

    #[serde(default)]
    pub deploy: DeploySettings,

    #[serde(default)]
    pub terminal: TerminalSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    /// Apply the `PORT`, `JWT_SECRET` and `DATABASE_URL` environment variables
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid PORT value '{}'", port),
            }
        }
        if let Some(secret) = var("JWT_SECRET").filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = Some(SecretString::from(secret));
        }
        if let Some(path) = var("DATABASE_URL").filter(|s| !s.is_empty()) {
            self.store.path = PathBuf::from(path);
        }
    }
}

/// HTTP server settings
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Docker engine settings
#[derive(Debug, Deserialize)]
pub struct DockerSettings {
    /// Startup ping deadline
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request deadline; bounds image builds too
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    1800
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Deploy pipeline settings
#[derive(Debug, Deserialize)]
pub struct DeploySettings {
    /// Parent of per-attempt workspaces; the system temp dir when unset
    #[serde(default)]
    pub workspace_dir: Option<PathBuf>,

    #[serde(default = "default_name_prefix")]
    pub workspace_prefix: String,

    #[serde(default = "default_name_prefix")]
    pub container_prefix: String,

    #[serde(default = "default_platform")]
    pub default_platform: String,

    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub retire_previous_container: bool,
}

fn default_name_prefix() -> String {
    "gakwayapanel-app".to_string()
}

fn default_platform() -> String {
    "linux/amd64".to_string()
}

fn default_fetch_timeout() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            workspace_dir: None,
            workspace_prefix: default_name_prefix(),
            container_prefix: default_name_prefix(),
            default_platform: default_platform(),
            fetch_timeout_secs: default_fetch_timeout(),
            retire_previous_container: true,
        }
    }
}

/// Terminal session settings
#[derive(Debug, Deserialize)]
pub struct TerminalSettings {
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_shell() -> Vec<String> {
    vec!["/bin/sh".to_string()]
}

fn default_write_timeout() -> u64 {
    10
}

fn default_chunk_size() -> usize {
    4096
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            write_timeout_secs: default_write_timeout(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Application store settings
#[derive(Debug, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/gakwaya/applications.json")
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// API authentication settings
#[derive(Debug, Default, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub jwt_secret: Option<SecretString>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let secret = Option::<String>::deserialize(deserializer)?;
    Ok(secret.filter(|s| !s.is_empty()).map(SecretString::from))
}
