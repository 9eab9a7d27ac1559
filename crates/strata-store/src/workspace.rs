use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use strata_types::{Digest, RelPath};
use tracing::{debug, info, warn};

use crate::algebra::DigestAlgebra;
use crate::error::StoreResult;
use crate::memory::InMemoryObjectStore;
use crate::snapshot::{FileContent, Snapshot};

/// The user's real source tree, as seen by goals that rewrite files.
pub trait Workspace: Send + Sync {
    /// Write every file of `digest` into the workspace, overwriting
    /// existing files at the same paths. Files not in `digest` are untouched.
    /// On error the workspace is restored to its previous state.
    fn write_digest(&self, digest: &Digest) -> StoreResult<()>;
}

/// A workspace rooted at a directory on disk.
pub struct DiskWorkspace {
    root: PathBuf,
    store: Arc<InMemoryObjectStore>,
}

impl DiskWorkspace {
    pub fn new(root: impl Into<PathBuf>, store: Arc<InMemoryObjectStore>) -> Self {
        Self {
            root: root.into(),
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read `paths` (files or directories) from disk into the store.
    pub fn capture(&self, paths: &[RelPath]) -> StoreResult<Snapshot> {
        let mut files = Vec::new();
        for path in paths {
            let absolute = self.root.join(path.as_str());
            for entry in walkdir::WalkDir::new(&absolute).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&self.root)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
                let relative = RelPath::new(relative.to_string_lossy().replace('\\', "/"))?;
                let content = fs::read(entry.path())?;
                let mut file = FileContent::new(relative, content);
                if is_executable(&entry.metadata().map_err(std::io::Error::from)?) {
                    file = file.executable();
                }
                files.push(file);
            }
        }
        let digest = self.store.create_digest(files)?;
        self.store.snapshot(&digest)
    }
}

impl Workspace for DiskWorkspace {
    fn write_digest(&self, digest: &Digest) -> StoreResult<()> {
        let contents = self.store.contents(digest)?;
        // Stage everything first so a failure leaves the tree untouched.
        let staging = tempfile::TempDir::new_in(&self.root)?;
        for file in &contents {
            let staged = staging.path().join(file.path.as_str());
            if let Some(parent) = staged.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&staged, &file.content)?;
            if file.is_executable {
                set_executable(&staged)?;
            }
        }
        let backups = tempfile::TempDir::new_in(&self.root)?;
        let mut placement = Placement::new(staging.path(), backups.path());
        for file in &contents {
            if let Err(e) = placement.place(&self.root, &file.path) {
                warn!(path = %file.path, error = %e, "workspace write failed, rolling back");
                placement.roll_back();
                return Err(e.into());
            }
            debug!(path = %file.path, "wrote workspace file");
        }
        info!(files = contents.len(), digest = %digest, root = %self.root.display(), "materialized digest");
        Ok(())
    }
}

/// Moves staged files into place one at a time and remembers how to undo
/// each move.
struct Placement<'a> {
    staged: &'a Path,
    backups: &'a Path,
    created_dirs: Vec<PathBuf>,
    /// Each target written, with the backup of the file it replaced.
    placed: Vec<(PathBuf, Option<PathBuf>)>,
}

impl<'a> Placement<'a> {
    fn new(staged: &'a Path, backups: &'a Path) -> Self {
        Self {
            staged,
            backups,
            created_dirs: Vec::new(),
            placed: Vec::new(),
        }
    }

    fn place(&mut self, root: &Path, path: &RelPath) -> io::Result<()> {
        let target = root.join(path.as_str());
        if let Some(parent) = target.parent() {
            self.create_dirs(parent)?;
        }
        let replaces_file = fs::symlink_metadata(&target)
            .map(|meta| !meta.is_dir())
            .unwrap_or(false);
        let backup = if replaces_file {
            let backup = self.backups.join(path.as_str());
            if let Some(parent) = backup.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&target, &backup)?;
            Some(backup)
        } else {
            None
        };
        let moved = fs::rename(self.staged.join(path.as_str()), &target);
        self.placed.push((target, backup));
        moved
    }

    fn create_dirs(&mut self, dir: &Path) -> io::Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(dir) = current {
            if dir.exists() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }
        for dir in missing.into_iter().rev() {
            fs::create_dir(&dir)?;
            self.created_dirs.push(dir);
        }
        Ok(())
    }

    fn roll_back(self) {
        for (target, backup) in self.placed.into_iter().rev() {
            // The target may never have been written.
            let _ = fs::remove_file(&target);
            if let Some(backup) = backup {
                if let Err(e) = fs::rename(&backup, &target) {
                    warn!(path = %target.display(), error = %e, "could not restore file");
                }
            }
        }
        for dir in self.created_dirs.into_iter().rev() {
            let _ = fs::remove_dir(&dir);
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
