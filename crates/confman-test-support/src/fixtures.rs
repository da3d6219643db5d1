//! Temporary managed config trees.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use confman_config::{ManagedRoot, ManagerConfig, ManagerSettings};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A temporary share directory with resolved settings pointing into it.
///
/// The managed roots are not created up front; the store creates them lazily.
pub struct ManagedTree {
    temp: TempDir,
    settings: ManagerSettings,
}

impl ManagedTree {
    /// Tree with default settings rooted in a fresh temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the settings fail to resolve.
    pub fn new() -> Result<Self> {
        Self::with_config(|_| {})
    }

    /// Tree whose configuration is adjusted by `customise` before resolving.
    ///
    /// `share_dir` is set to the temporary directory before `customise` runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the settings fail to resolve.
    pub fn with_config(customise: impl FnOnce(&mut ManagerConfig)) -> Result<Self> {
        let temp = tempfile::Builder::new().prefix("confman-").tempdir()?;
        let mut config = ManagerConfig {
            share_dir: temp.path().to_path_buf(),
            ..ManagerConfig::default()
        };
        customise(&mut config);
        let settings = config.resolve().context("resolving fixture settings")?;
        Ok(Self { temp, settings })
    }

    /// Temporary share directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Resolved settings.
    #[must_use]
    pub const fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// Path of a managed root.
    #[must_use]
    pub fn root(&self, root: ManagedRoot) -> PathBuf {
        self.settings.directories.get(root).to_path_buf()
    }

    /// Write `contents` to `relative` below `root`, creating parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(
        &self,
        root: ManagedRoot,
        relative: impl AsRef<Path>,
        contents: &str,
    ) -> Result<PathBuf> {
        let path = self.root(root).join(relative);
        write_file(&path, contents)?;
        Ok(path)
    }

    /// Write `contents` to `relative` below the share directory, creating parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_outside(&self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
        let path = self.path().join(relative);
        write_file(&path, contents)?;
        Ok(path)
    }

    /// Regular files below `root`, sorted. Empty when the root does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk fails.
    pub fn files_under(&self, root: ManagedRoot) -> Result<Vec<PathBuf>> {
        let base = self.root(root);
        if !base.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&base) {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Every file and directory under the share directory with its contents.
    ///
    /// Directories map to an empty vector. Useful to assert an operation left
    /// the tree untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the walk or a read fails.
    pub fn snapshot(&self) -> Result<BTreeMap<PathBuf, Vec<u8>>> {
        let mut entries = BTreeMap::new();
        for entry in WalkDir::new(self.path()) {
            let entry = entry?;
            let contents = if entry.file_type().is_file() {
                fs::read(entry.path())?
            } else {
                Vec::new()
            };
            entries.insert(entry.into_path(), contents);
        }
        Ok(entries)
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}
