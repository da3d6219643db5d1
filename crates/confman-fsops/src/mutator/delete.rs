use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use confman_config::{ManagedRoot, clean_path};
use confman_events::Status;
use tracing::{debug, info, warn};

use super::{Mutator, directory_is_empty, run_operation};
use crate::decode::{decode_sections, select_section};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{ConfigDescriptor, MutationResult};
use crate::registry;

impl Mutator {
    /// Remove a config file, or an empty ticker directory.
    ///
    /// When the removal leaves an empty ticker directory behind, that
    /// directory is removed as well. A failure to do so is reported as a
    /// partial success with status `Error`.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::MutationFailure`] when the target is missing, fails
    /// the path policy, is a directory that may not be deleted, or cannot be
    /// removed. The filesystem is untouched in every failure case.
    pub fn delete(&self, target: &Path) -> MutationResult {
        run_operation(
            "delete",
            ConfigDescriptor::for_file(target),
            |descriptor| self.delete_config(target, descriptor),
        )
    }

    fn delete_config(&self, target: &Path, descriptor: &mut ConfigDescriptor) -> FsOpsResult<String> {
        let metadata = fs::symlink_metadata(target).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                FsOpsError::NotFound {
                    path: target.to_path_buf(),
                }
            } else {
                FsOpsError::io("delete.stat", target, source)
            }
        })?;

        let path = clean_path(target);
        let root = self.policy.check(&path)?;
        self.policy.check_resolved(&path, root)?;
        self.classify(&path, root, &metadata, descriptor);

        if metadata.is_dir() {
            if !self.removable_directory(&path, descriptor)? {
                return Err(FsOpsError::Forbidden { path });
            }
            fs::remove_dir(&path).map_err(|source| FsOpsError::io("delete.remove_dir", &path, source))?;
        } else {
            fs::remove_file(&path)
                .map_err(|source| FsOpsError::io("delete.remove_file", &path, source))?;
        }
        info!(path = %path.display(), root = %root, "deleted configuration");

        let Some(parent) = path.parent() else {
            return Ok(format!("Successfully deleted file: {}", path.display()));
        };
        if !self.parent_needs_cleanup(parent) {
            return Ok(format!("Successfully deleted file: {}", path.display()));
        }

        match fs::remove_dir(parent) {
            Ok(()) => {
                info!(path = %parent.display(), "removed empty ticker directory");
                Ok(format!(
                    "Successfully removed file: {} as well as empty process ticker directory: {}",
                    path.display(),
                    parent.display()
                ))
            }
            Err(err) => {
                warn!(path = %parent.display(), error = %err, "failed to remove empty ticker directory");
                descriptor.status = Status::Error;
                Ok(format!(
                    "Successfully removed file: {} but failed to remove process ticker directory: {}",
                    path.display(),
                    parent.display()
                ))
            }
        }
    }

    /// Fill the descriptor from the target's location and, for files, its contents.
    fn classify(
        &self,
        path: &Path,
        root: ManagedRoot,
        metadata: &Metadata,
        descriptor: &mut ConfigDescriptor,
    ) {
        descriptor.describe_kind(registry::for_root(root));
        if root == ManagedRoot::Process {
            descriptor.ticker = self.policy.ticker_of(path);
        }
        if !metadata.is_file() {
            return;
        }

        let text = match self.env.substitute_file(path) {
            Ok(text) => text,
            Err(err) => {
                debug!(path = %path.display(), error = %err.report(), "deleted config substitution failed");
                return;
            }
        };
        let sections = match decode_sections(&text) {
            Ok(sections) => sections,
            Err(err) => {
                debug!(path = %path.display(), error = %err.report(), "deleted config failed to decode");
                return;
            }
        };
        if let Some(section) = select_section(&sections, &self.include_types) {
            section.name().clone_into(&mut descriptor.name);
            if root != ManagedRoot::Process {
                descriptor.describe_section(section);
            }
        }
    }

    /// Empty strict descendant of the process root, classified as interval-driven.
    fn removable_directory(&self, path: &Path, descriptor: &ConfigDescriptor) -> FsOpsResult<bool> {
        if !self.policy.is_ticker_directory(path) || !descriptor.is_interval_driven() {
            return Ok(false);
        }
        directory_is_empty(path)
    }

    fn parent_needs_cleanup(&self, parent: &Path) -> bool {
        self.policy.is_ticker_directory(parent)
            && self.policy.check(parent).is_ok()
            && directory_is_empty(parent).unwrap_or(false)
    }
}
