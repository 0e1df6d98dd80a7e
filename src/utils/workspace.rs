//! Process-private scratch directory for subsystem logs and data.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use crate::Result;

/// A temporary directory owned by exactly one mini cluster.
///
/// Unlike `tempfile::TempDir` nothing happens on drop: the owner decides when
/// to call [`ScopedWorkspace::destroy`] and gets every deletion failure back.
#[derive(Debug)]
pub struct ScopedWorkspace {
    path: PathBuf,
}

impl ScopedWorkspace {
    /// Creates a fresh, uniquely named directory under the system temp dir.
    pub fn create(prefix: &str) -> Result<Self> {
        let path = tempfile::Builder::new().prefix(prefix).tempdir()?.keep();
        debug!(path = %path.display(), "created scoped workspace");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates (if needed) and returns a directory inside the workspace.
    pub fn subdir(
        &self,
        name: &str,
    ) -> Result<PathBuf> {
        let dir = self.path.join(name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Recursively deletes the workspace, deepest paths first.
    ///
    /// Every entry is attempted even if an earlier one fails; the first failure
    /// is returned. Destroying an already removed workspace succeeds.
    pub fn destroy(&self) -> Result<()> {
        if fs::symlink_metadata(&self.path).is_err() {
            return Ok(());
        }

        let mut entries = Vec::new();
        collect_entries(&self.path, &mut entries)?;
        entries.push((self.path.clone(), true));
        // Reverse lexical order puts every child ahead of its parent.
        entries.sort_by(|a, b| b.0.cmp(&a.0));

        let mut first_error: Option<io::Error> = None;
        for (path, is_dir) in entries {
            let result = if is_dir {
                fs::remove_dir(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, "failed to delete workspace entry");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => {
                debug!(path = %self.path.display(), "destroyed scoped workspace");
                Ok(())
            }
        }
    }
}

fn collect_entries(
    dir: &Path,
    out: &mut Vec<(PathBuf, bool)>,
) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        // Symlinks are removed, never followed.
        let is_dir = entry.file_type()?.is_dir();
        if is_dir {
            collect_entries(&path, out)?;
        }
        out.push((path, is_dir));
    }
    Ok(())
}
