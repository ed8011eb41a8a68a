//! Build context packaging
//!
//! Turns a checked-out source tree into the tar archive the image builder
//! consumes. Only regular files and directories are archived. Symlinks,
//! sockets, FIFOs and device nodes are skipped and never followed, so a
//! repository cannot smuggle files from outside its own tree into a build.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::errors::PackError;

/// A packaged build context.
///
/// Single use: the archive is moved into the build call and cannot be
/// replayed. A retried build has to pack the tree again.
#[derive(Debug)]
pub struct BuildContext {
    archive: Vec<u8>,
    entries: usize,
    skipped: usize,
}

impl BuildContext {
    /// Number of archived files and directories
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Number of entries left out by the special-file policy
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Archive size in bytes
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Consume the context, yielding the raw tar stream
    pub fn into_bytes(self) -> Vec<u8> {
        self.archive
    }
}

/// Package `root` on a blocking thread
pub async fn pack(root: &Path) -> Result<BuildContext, PackError> {
    let root = root.to_path_buf();
    let context = tokio::task::spawn_blocking(move || pack_blocking(&root))
        .await
        .map_err(|e| PackError::Task(e.to_string()))??;

    info!(
        "Packed build context: {} entries, {} skipped, {} bytes",
        context.entries,
        context.skipped,
        context.archive.len()
    );
    Ok(context)
}

/// Package `root` on the current thread
pub fn pack_blocking(root: &Path) -> Result<BuildContext, PackError> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(false);

    let mut entries = 0;
    let mut skipped = 0;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| PackError::Walk {
            path: e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf()),
            reason: e.to_string(),
        })?;

        let path = entry.path();
        let rel = relative(root, path)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            builder
                .append_dir(&rel, path)
                .map_err(|source| archive_err(path, source))?;
        } else if file_type.is_file() {
            builder
                .append_path_with_name(path, &rel)
                .map_err(|source| archive_err(path, source))?;
        } else {
            debug!("Skipping non-regular entry {}", rel.display());
            skipped += 1;
            continue;
        }
        entries += 1;
    }

    let archive = builder
        .into_inner()
        .map_err(|source| archive_err(root, source))?;

    Ok(BuildContext {
        archive,
        entries,
        skipped,
    })
}

fn relative(root: &Path, path: &Path) -> Result<PathBuf, PackError> {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|e| PackError::Walk {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn archive_err(path: &Path, source: std::io::Error) -> PackError {
    PackError::Archive {
        path: path.to_path_buf(),
        source,
    }
}
