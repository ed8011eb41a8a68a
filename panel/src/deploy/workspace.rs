//! Per-attempt scratch directories
//!
//! A [`Workspace`] owns a uniquely named directory for the lifetime of one
//! deploy attempt. The directory is removed when the handle is released or
//! dropped, so it never outlives the attempt even when the deploy future is
//! cancelled.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Create `<base>/<prefix>-<uuid>`
    pub async fn acquire(base: &Path, prefix: &str) -> io::Result<Self> {
        let path = base.join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        fs::create_dir_all(base).await?;
        // Fails on an existing directory, so a workspace is never shared
        fs::create_dir(&path).await?;
        debug!("Acquired workspace {}", path.display());
        Ok(Self {
            path,
            released: false,
        })
    }

    /// Get the workspace path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the workspace tree. Safe to call more than once.
    pub async fn release(&mut self) -> io::Result<()> {
        if self.released {
            return Ok(());
        }
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.released = true;
        debug!("Released workspace {}", self.path.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed workspace {} on drop", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove workspace {}: {}", self.path.display(), e),
        }
    }
}
