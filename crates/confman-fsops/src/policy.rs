//! Path-safety predicate shared by add, delete, and list.
//!
//! A path is permitted iff its cleaned form sits under no exclude prefix and
//! under at least one managed root. Prefixes compare whole components, so
//! `/a/http.d2` is not under `/a/http.d`. Exclusion wins.
//!
//! [`PathPolicy::check_resolved`] repeats the predicate after following
//! symlinks, so a link inside a root cannot carry a mutation outside it.

use std::fs;
use std::path::{Path, PathBuf};

use confman_config::{ManagedDirectories, ManagedRoot, ManagerSettings, clean_path};

use crate::error::{FsOpsError, FsOpsResult};

/// Root and exclude-prefix policy for every filesystem mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPolicy {
    roots: ManagedDirectories,
    excludes: Vec<PathBuf>,
}

impl PathPolicy {
    /// Build a policy; every exclude prefix is cleaned lexically.
    #[must_use]
    pub fn new(roots: ManagedDirectories, excludes: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots,
            excludes: excludes
                .into_iter()
                .map(|prefix| clean_path(&prefix))
                .collect(),
        }
    }

    /// Policy derived from resolved settings.
    #[must_use]
    pub fn from_settings(settings: &ManagerSettings) -> Self {
        Self::new(
            settings.directories.clone(),
            settings.exclude_paths.iter().cloned(),
        )
    }

    /// The managed roots this policy guards.
    #[must_use]
    pub const fn roots(&self) -> &ManagedDirectories {
        &self.roots
    }

    /// First exclude prefix covering `path`, if any.
    #[must_use]
    pub fn excluded_by(&self, path: &Path) -> Option<&Path> {
        let cleaned = clean_path(path);
        self.excludes
            .iter()
            .find(|prefix| cleaned.starts_with(prefix))
            .map(PathBuf::as_path)
    }

    /// Whether `path` is under any exclude prefix.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_by(path).is_some()
    }

    /// Managed root containing `path`, ignoring excludes.
    #[must_use]
    pub fn root_of(&self, path: &Path) -> Option<ManagedRoot> {
        let cleaned = clean_path(path);
        self.roots
            .iter()
            .find(|(_, root)| cleaned.starts_with(root))
            .map(|(root, _)| root)
    }

    /// Apply the predicate, returning the owning root.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::SafetyViolation`] when the path is excluded or
    /// outside every managed root.
    pub fn check(&self, path: &Path) -> FsOpsResult<ManagedRoot> {
        let cleaned = clean_path(path);
        if let Some(prefix) = self.excluded_by(&cleaned) {
            return Err(FsOpsError::SafetyViolation {
                excluded_by: Some(prefix.to_path_buf()),
                path: cleaned,
            });
        }
        self.root_of(&cleaned)
            .ok_or_else(|| FsOpsError::SafetyViolation {
                path: cleaned,
                excluded_by: None,
            })
    }

    /// Re-apply the predicate to `path` with its parent directory resolved
    /// through the filesystem, requiring the same owning `root`.
    ///
    /// Roots and exclude prefixes that exist are resolved too. The final
    /// component is kept as-is, so a symlink target itself is judged by its
    /// own location.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Io`] if the parent directory cannot be resolved,
    /// and [`FsOpsError::SafetyViolation`] when the resolved path is excluded
    /// or lies under a different root (or none).
    pub fn check_resolved(&self, path: &Path, root: ManagedRoot) -> FsOpsResult<()> {
        let cleaned = clean_path(path);
        let (Some(parent), Some(name)) = (cleaned.parent(), cleaned.file_name()) else {
            return Ok(());
        };
        let resolved = fs::canonicalize(parent)
            .map_err(|source| FsOpsError::io("policy.resolve", parent, source))?
            .join(name);

        let physical = self.resolved();
        if let Some(prefix) = physical.excluded_by(&resolved) {
            return Err(FsOpsError::SafetyViolation {
                excluded_by: Some(prefix.to_path_buf()),
                path: cleaned,
            });
        }
        if physical.root_of(&resolved) == Some(root) {
            Ok(())
        } else {
            Err(FsOpsError::SafetyViolation {
                path: cleaned,
                excluded_by: None,
            })
        }
    }

    /// This policy with every existing root and prefix resolved through the
    /// filesystem.
    fn resolved(&self) -> Self {
        let physical = |path: &Path| fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self {
            roots: ManagedDirectories::new(
                physical(self.roots.get(ManagedRoot::Process)),
                physical(self.roots.get(ManagedRoot::Logstreamer)),
                physical(self.roots.get(ManagedRoot::Http)),
                physical(self.roots.get(ManagedRoot::FilePolling)),
            ),
            excludes: self
                .excludes
                .iter()
                .map(|prefix| physical(prefix.as_path()))
                .collect(),
        }
    }

    /// Whether `path` is a strict descendant of the process root.
    #[must_use]
    pub fn is_ticker_directory(&self, path: &Path) -> bool {
        let cleaned = clean_path(path);
        let process_root = self.roots.get(ManagedRoot::Process);
        cleaned != process_root && cleaned.starts_with(process_root)
    }

    /// Ticker seconds encoded in the first directory below the process root.
    #[must_use]
    pub fn ticker_of(&self, path: &Path) -> Option<u32> {
        let cleaned = clean_path(path);
        let relative = cleaned
            .strip_prefix(self.roots.get(ManagedRoot::Process))
            .ok()?;
        let first = relative.components().next()?;
        first.as_os_str().to_str()?.parse().ok()
    }
}
