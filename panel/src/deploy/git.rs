//! Git source fetcher

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::FetchError;
use crate::models::deployment::CommitRef;

/// Clones a source repository into a local directory
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Clone `url` into the empty directory `dest`.
    ///
    /// With `branch` set only that branch is fetched, otherwise the remote's
    /// default branch.
    async fn fetch(
        &self,
        url: &str,
        branch: Option<&str>,
        dest: &Path,
    ) -> Result<CommitRef, FetchError>;
}

/// Fetcher driving the `git` command line client
#[derive(Debug, Clone)]
pub struct GitCliFetcher {
    timeout: Duration,
}

impl GitCliFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for GitCliFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl SourceFetcher for GitCliFetcher {
    async fn fetch(
        &self,
        url: &str,
        branch: Option<&str>,
        dest: &Path,
    ) -> Result<CommitRef, FetchError> {
        validate_source_url(url)?;
        ensure_empty_dir(dest).await?;

        info!(
            "Cloning {} (branch: {}) into {}",
            url,
            branch.unwrap_or("<default>"),
            dest.display()
        );

        let mut args: Vec<String> = vec![
            "clone".into(),
            "--depth".into(),
            "1".into(),
            "--single-branch".into(),
        ];
        if let Some(branch) = branch {
            args.push("--branch".into());
            args.push(branch.to_string());
        }
        args.push("--".into());
        args.push(url.to_string());
        args.push(dest.to_string_lossy().into_owned());

        let child = Command::new("git")
            .args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::Unreachable(format!("Failed to run git clone: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                FetchError::Unreachable(format!("git clone timed out after {:?}", self.timeout))
            })?
            .map_err(|e| FetchError::Unreachable(format!("Failed to run git clone: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("git clone failed: {}", stderr.trim());
            return Err(classify_clone_failure(&stderr, branch));
        }

        let commit = head_commit(dest).await?;
        info!("Cloned {} at {}", url, commit);
        Ok(commit)
    }
}

async fn head_commit(repo: &Path) -> Result<CommitRef, FetchError> {
    let output = Command::new("git")
        .current_dir(repo)
        .args(["rev-parse", "HEAD"])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| FetchError::Destination(format!("Failed to run git rev-parse: {}", e)))?;

    if !output.status.success() {
        return Err(FetchError::Destination(format!(
            "git rev-parse failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(CommitRef(
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    ))
}

async fn ensure_empty_dir(dest: &Path) -> Result<(), FetchError> {
    let mut entries = tokio::fs::read_dir(dest)
        .await
        .map_err(|e| FetchError::Destination(format!("{}: {}", dest.display(), e)))?;
    let first = entries
        .next_entry()
        .await
        .map_err(|e| FetchError::Destination(format!("{}: {}", dest.display(), e)))?;
    if first.is_some() {
        return Err(FetchError::Destination(format!(
            "{} is not empty",
            dest.display()
        )));
    }
    Ok(())
}

/// Reject URLs git should never be handed
pub fn validate_source_url(url: &str) -> Result<(), FetchError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(FetchError::InvalidUrl("empty URL".to_string()));
    }
    if url.starts_with('-') {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" | "ssh" | "git" | "file" => Ok(()),
            other => Err(FetchError::InvalidUrl(format!(
                "unsupported scheme '{}' in {}",
                other, url
            ))),
        },
        // scp-like syntax: user@host:path
        Err(_) if is_scp_like(url) => Ok(()),
        Err(e) => Err(FetchError::InvalidUrl(format!("{}: {}", url, e))),
    }
}

fn is_scp_like(url: &str) -> bool {
    match url.split_once(':') {
        Some((host, path)) => {
            !host.is_empty() && !host.contains('/') && !path.is_empty() && !path.starts_with("//")
        }
        None => false,
    }
}

/// Map git's diagnostics onto a fetch failure kind
pub fn classify_clone_failure(stderr: &str, branch: Option<&str>) -> FetchError {
    let message = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("Cloning into"))
        .collect::<Vec<_>>()
        .join("; ");
    let lower = message.to_lowercase();
    debug!("Classifying git failure: {}", message);

    if lower.contains("remote branch") && lower.contains("not found") {
        return FetchError::BranchNotFound(branch.unwrap_or_default().to_string());
    }
    if lower.contains("authentication failed")
        || lower.contains("could not read username")
        || lower.contains("could not read password")
        || lower.contains("terminal prompts disabled")
        || lower.contains("permission denied (publickey")
        || lower.contains("host key verification failed")
    {
        return FetchError::Auth(message);
    }
    if lower.contains("already exists and is not an empty directory")
        || lower.contains("could not create work tree")
        || lower.contains("permission denied")
    {
        return FetchError::Destination(message);
    }
    FetchError::Unreachable(message)
}
