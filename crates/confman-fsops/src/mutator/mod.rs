//! Add, delete, and list operations over the managed config tree.
//!
//! All operations run inline on the caller's thread. Failures are local to the
//! request that caused them; only a walk error surfaced by [`ConfigListing`]
//! is meant to be treated as fatal by callers.

mod add;
mod delete;
mod list;

pub use list::ConfigListing;

use std::fs;
use std::path::{Path, PathBuf};

use confman_config::ManagerSettings;
use confman_events::Status;
use tracing::debug;

use crate::envsubst::EnvSubstituter;
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{ConfigDescriptor, MutationFailure, MutationOutcome, MutationResult};
use crate::policy::PathPolicy;

/// Prefix of generated config file names.
pub const FILE_PREFIX: &str = "cm";
/// Extension of config files, without the dot.
pub const CONFIG_EXTENSION: &str = "toml";

/// Filesystem-backed config store.
#[derive(Debug, Clone)]
pub struct Mutator {
    policy: PathPolicy,
    include_types: Vec<String>,
    env: EnvSubstituter,
}

impl Mutator {
    /// Store bound to `settings`, substituting from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Pattern`] if the substitution pattern fails to compile.
    pub fn new(settings: &ManagerSettings) -> FsOpsResult<Self> {
        Ok(Self::with_substituter(settings, EnvSubstituter::from_env()?))
    }

    /// Store bound to `settings` with an explicit substituter.
    #[must_use]
    pub fn with_substituter(settings: &ManagerSettings, env: EnvSubstituter) -> Self {
        Self {
            policy: PathPolicy::from_settings(settings),
            include_types: settings.include_types.clone(),
            env,
        }
    }

    /// Path policy guarding every operation.
    #[must_use]
    pub const fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Allow-listed types in priority order.
    #[must_use]
    pub fn include_types(&self) -> &[String] {
        &self.include_types
    }
}

/// Random collision-free file name: prefix, 32 lowercase hex digits, extension.
pub(crate) fn generate_file_name() -> PathBuf {
    let id: u128 = rand::random();
    PathBuf::from(format!("{FILE_PREFIX}{id:032x}.{CONFIG_EXTENSION}"))
}

/// Run an operation body against a fresh descriptor and package the result.
fn run_operation<F>(
    operation: &'static str,
    mut descriptor: ConfigDescriptor,
    body: F,
) -> MutationResult
where
    F: FnOnce(&mut ConfigDescriptor) -> FsOpsResult<String>,
{
    match body(&mut descriptor) {
        Ok(message) => {
            debug!(
                operation,
                file = %descriptor.file_name_display(),
                status = %descriptor.status,
                "config operation completed"
            );
            Ok(MutationOutcome {
                descriptor,
                message,
            })
        }
        Err(error) => {
            descriptor.status = Status::Error;
            debug!(
                operation,
                file = %descriptor.file_name_display(),
                kind = error.kind().as_str(),
                "config operation failed"
            );
            Err(Box::new(MutationFailure { descriptor, error }))
        }
    }
}

fn directory_is_empty(path: &Path) -> FsOpsResult<bool> {
    let mut entries =
        fs::read_dir(path).map_err(|source| FsOpsError::io("dir.read", path, source))?;
    Ok(entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_have_prefix_and_hex_body() {
        let name = generate_file_name();
        let name = name.to_string_lossy();
        let body = name
            .strip_prefix(FILE_PREFIX)
            .and_then(|rest| rest.strip_suffix(".toml"))
            .unwrap_or_default();
        assert_eq!(body.len(), 32, "{name}");
        assert!(body.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(generate_file_name(), generate_file_name());
    }
}
