use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use confman_config::ManagedRoot;
use confman_events::Status;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{CONFIG_EXTENSION, Mutator};
use crate::decode::{decode_sections, select_section};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{ConfigDescriptor, ListedConfig};

impl Mutator {
    /// Lazily walk every managed root in declaration order.
    ///
    /// Each call starts a fresh, read-only walk.
    #[must_use]
    pub fn list(&self) -> ConfigListing<'_> {
        let roots: Vec<(ManagedRoot, PathBuf)> = self
            .policy
            .roots()
            .iter()
            .map(|(root, path)| (root, path.to_path_buf()))
            .collect();
        ConfigListing {
            mutator: self,
            pending: roots.into_iter(),
            current: None,
            finished: false,
        }
    }

    /// Describe one listed file. Never fails: problems become status `Error`.
    fn describe_listed(&self, path: &Path) -> ListedConfig {
        let mut descriptor = ConfigDescriptor::for_file(path);
        let payload = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let error = FsOpsError::io("list.read", path, source);
                warn!(path = %path.display(), error = %error.report(), "failed to read listed config");
                descriptor.status = Status::Error;
                return ListedConfig {
                    descriptor,
                    payload: error.report().into_bytes(),
                };
            }
        };

        if let Err(error) = self.describe_contents(&payload, &mut descriptor) {
            warn!(path = %path.display(), error = %error.report(), "listed config failed to decode");
            descriptor.status = Status::Error;
        }
        ListedConfig {
            descriptor,
            payload,
        }
    }

    fn describe_contents(&self, payload: &[u8], descriptor: &mut ConfigDescriptor) -> FsOpsResult<()> {
        let text = std::str::from_utf8(payload).map_err(|_| FsOpsError::Decode {
            operation: "list.utf8",
            key: None,
            source: None,
        })?;
        let text = self.env.substitute(text)?;
        let sections = decode_sections(&text)?;
        if let Some(section) = select_section(&sections, &self.include_types) {
            descriptor.describe_section(section);
            descriptor.ticker = section.own_ticker()?;
        }
        Ok(())
    }
}

/// Lazy walk over the managed roots yielding one item per config file.
///
/// Excluded directories are pruned. A missing root counts as empty. Any other
/// traversal error is yielded once as [`FsOpsError::Walk`] and ends the listing.
pub struct ConfigListing<'a> {
    mutator: &'a Mutator,
    pending: vec::IntoIter<(ManagedRoot, PathBuf)>,
    current: Option<(ManagedRoot, walkdir::IntoIter)>,
    finished: bool,
}

impl Iterator for ConfigListing<'_> {
    type Item = FsOpsResult<ListedConfig>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            if self.current.is_none() {
                let (root, path) = self.pending.next()?;
                debug!(root = %root, path = %path.display(), "walking managed root");
                self.current = Some((root, WalkDir::new(path).follow_links(false).into_iter()));
            }
            let Some((root, walker)) = self.current.as_mut() else {
                continue;
            };
            let root = *root;

            match walker.next() {
                None => self.current = None,
                Some(Err(err)) if err.depth() == 0 && is_not_found(&err) => {
                    debug!(root = %root, "managed root does not exist yet");
                    self.current = None;
                }
                Some(Err(err)) => {
                    let path = err.path().map_or_else(
                        || self.mutator.policy.roots().get(root).to_path_buf(),
                        Path::to_path_buf,
                    );
                    self.current = None;
                    self.finished = true;
                    return Some(Err(FsOpsError::walk("list.walk", path, err)));
                }
                Some(Ok(entry)) => {
                    if self.mutator.policy.is_excluded(entry.path()) {
                        debug!(path = %entry.path().display(), "skipping excluded path");
                        if entry.file_type().is_dir() {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                    let is_config = entry.file_type().is_file()
                        && entry
                            .path()
                            .extension()
                            .is_some_and(|ext| ext == CONFIG_EXTENSION);
                    if is_config {
                        return Some(Ok(self.mutator.describe_listed(entry.path())));
                    }
                }
            }
        }
    }
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|source| source.kind() == io::ErrorKind::NotFound)
}
