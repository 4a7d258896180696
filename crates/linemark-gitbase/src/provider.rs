//! Baseline retrieval from a git repository via git2.
//!
//! The baseline of a file is its blob at a configurable revision (`HEAD` by
//! default); the current version is whatever is on disk in the work dir.

use std::path::{Path, PathBuf};

use git2::{ObjectType, Repository};
use linemark_core::LinemarkError;
use linemark_sync::{FileId, VersionProvider};
use parking_lot::Mutex;

/// A [`VersionProvider`] backed by a git work tree.
///
/// File ids may be absolute paths inside the work dir or paths relative to
/// it. Every lookup failure is reported as `None`; nothing here panics on a
/// broken repository.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use linemark_gitbase::GitVersionProvider;
/// use linemark_sync::{FileId, VersionProvider};
///
/// let provider = GitVersionProvider::discover(Path::new("."), "HEAD").unwrap();
/// let file = FileId::new("src/main.rs");
/// if provider.is_tracked(&file) {
///     let committed = provider.baseline_content(&file);
///     println!("{} bytes committed", committed.map_or(0, |s| s.len()));
/// }
/// ```
pub struct GitVersionProvider {
    repo: Mutex<Repository>,
    workdir: PathBuf,
    baseline_rev: String,
}

impl std::fmt::Debug for GitVersionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitVersionProvider")
            .field("workdir", &self.workdir)
            .field("baseline_rev", &self.baseline_rev)
            .finish()
    }
}

impl GitVersionProvider {
    /// Find the repository containing `path`, searching upwards.
    ///
    /// # Errors
    ///
    /// Returns [`LinemarkError::Git`] if no repository is found or it is bare.
    pub fn discover(path: &Path, baseline_rev: &str) -> Result<Self, LinemarkError> {
        let repo = Repository::discover(path)
            .map_err(|e| LinemarkError::Git(format!("failed to open repository: {e}")))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| LinemarkError::Git("repository has no work dir".into()))?;
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());
        tracing::debug!(workdir = %workdir.display(), baseline_rev, "Opened git repository");

        Ok(Self {
            repo: Mutex::new(repo),
            workdir,
            baseline_rev: baseline_rev.to_string(),
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn baseline_rev(&self) -> &str {
        &self.baseline_rev
    }

    /// Path of `file` relative to the work dir, or `None` if it lies outside.
    pub fn relative_path(&self, file: &FileId) -> Option<PathBuf> {
        let path = file.path();
        if path.is_relative() {
            return Some(path.to_path_buf());
        }
        let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        absolute
            .strip_prefix(&self.workdir)
            .ok()
            .map(Path::to_path_buf)
    }

    fn absolute_path(&self, file: &FileId) -> Option<PathBuf> {
        self.relative_path(file).map(|rel| self.workdir.join(rel))
    }

    /// Read the blob at `<baseline_rev>:<relative>`.
    fn read_baseline(&self, relative: &Path) -> Result<String, LinemarkError> {
        let repo = self.repo.lock();
        let tree = repo
            .revparse_single(&self.baseline_rev)
            .and_then(|object| object.peel_to_tree())
            .map_err(|e| LinemarkError::Git(format!("failed to resolve '{}': {e}", self.baseline_rev)))?;
        let entry = tree
            .get_path(relative)
            .map_err(|e| LinemarkError::Git(format!("{} not in {}: {e}", relative.display(), self.baseline_rev)))?;
        if entry.kind() != Some(ObjectType::Blob) {
            return Err(LinemarkError::Git(format!("{} is not a file", relative.display())));
        }
        let blob = repo
            .find_blob(entry.id())
            .map_err(|e| LinemarkError::Git(format!("failed to read blob: {e}")))?;
        String::from_utf8(blob.content().to_vec())
            .map_err(|_| LinemarkError::InputUnavailable(format!("{} is not valid UTF-8", relative.display())))
    }
}

impl VersionProvider for GitVersionProvider {
    fn is_tracked(&self, file: &FileId) -> bool {
        let Some(relative) = self.relative_path(file) else {
            return false;
        };
        if !self.workdir.join(&relative).is_file() {
            return false;
        }
        let repo = self.repo.lock();
        repo.revparse_single(&self.baseline_rev)
            .and_then(|object| object.peel_to_tree())
            .and_then(|tree| tree.get_path(&relative))
            .is_ok()
    }

    fn baseline_content(&self, file: &FileId) -> Option<String> {
        let relative = self.relative_path(file)?;
        match self.read_baseline(&relative) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(%file, error = %e, "Failed to read baseline");
                None
            }
        }
    }

    fn current_content(&self, file: &FileId) -> Option<String> {
        let path = self.absolute_path(file)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read working file");
                None
            }
        }
    }
}
