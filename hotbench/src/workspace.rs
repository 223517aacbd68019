//! Isolated Workspace
//!
//! A uniquely named directory owned by exactly one invocation. Generated
//! sources, resources and the compiled harness all live here, and the whole
//! tree is removed when the invocation ends.

use crate::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PREFIX: &str = "hotbench";

/// Workspace directory of one invocation
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Create an empty workspace below `root`, or below the system temporary
    /// directory when `root` is `None`
    pub fn create(root: Option<&Path>) -> Result<Self, Error> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| Error::io("cannot create benchmark workspace", e))?;

        let path = dir.keep();
        tracing::debug!(workspace = %path.display(), "created workspace");
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the harness executable compiled into this workspace.
    ///
    /// Derived from the directory name so that it is unique per invocation.
    pub fn harness_name(&self) -> String {
        let suffix: String = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
            .trim_start_matches(PREFIX)
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("hotbench_harness_{suffix}")
    }

    /// Recursively remove the workspace.
    ///
    /// Children are removed before their parents; entries that are already
    /// gone count as removed.
    pub fn destroy(mut self) -> Result<(), Error> {
        self.remove().map_err(|e| {
            Error::io(
                format!("cannot remove benchmark workspace {}", self.path.display()),
                e,
            )
        })
    }

    fn remove(&mut self) -> io::Result<()> {
        if self.removed {
            return Ok(());
        }

        for entry in WalkDir::new(&self.path).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(e.into()),
            };
            let removal = if entry.file_type().is_dir() {
                std::fs::remove_dir(entry.path())
            } else {
                std::fs::remove_file(entry.path())
            };
            match removal {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }

        self.removed = true;
        tracing::debug!(workspace = %self.path.display(), "removed workspace");
        Ok(())
    }
}

fn is_not_found(e: &walkdir::Error) -> bool {
    e.io_error()
        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.remove() {
            tracing::warn!(
                workspace = %self.path.display(),
                error = %e,
                "failed to remove benchmark workspace"
            );
        }
    }
}
