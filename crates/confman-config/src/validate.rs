//! Validation helpers and lexical path utilities.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{ManagedDirectories, ManagedRoot};

/// Lexically normalise a path without touching the filesystem.
///
/// Drops `.` components, resolves `..` against a preceding normal component,
/// and discards `..` directly under the root. An empty result becomes `.`.
#[must_use]
pub fn clean_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().map(|part| part.as_os_str()).collect()
}

pub(crate) fn validate_tag(tag: &str) -> ConfigResult<()> {
    if tag.trim().is_empty() {
        return Err(ConfigError::invalid("cm_tag", "empty", Some(tag.to_string())));
    }
    Ok(())
}

pub(crate) fn validate_include_types(types: &[String]) -> ConfigResult<()> {
    if types.is_empty() {
        return Err(ConfigError::invalid("include_types", "empty", None));
    }
    let mut seen = HashSet::new();
    for entry in types {
        if entry.trim().is_empty() {
            return Err(ConfigError::invalid(
                "include_types",
                "blank_entry",
                Some(entry.clone()),
            ));
        }
        if !seen.insert(entry.as_str()) {
            return Err(ConfigError::invalid(
                "include_types",
                "duplicate_entry",
                Some(entry.clone()),
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_exclude_paths(paths: &[PathBuf]) -> ConfigResult<()> {
    for path in paths {
        if path.as_os_str().is_empty() || path.to_string_lossy().trim().is_empty() {
            return Err(ConfigError::invalid(
                "exclude_paths",
                "blank_entry",
                Some(path.display().to_string()),
            ));
        }
    }
    Ok(())
}

/// Every file must resolve under exactly one root, so roots may not nest.
pub(crate) fn validate_roots(directories: &ManagedDirectories) -> ConfigResult<()> {
    let roots: Vec<(ManagedRoot, &Path)> = directories.iter().collect();
    for (index, (_, left)) in roots.iter().enumerate() {
        for (_, right) in roots.iter().skip(index + 1) {
            if left.starts_with(right) || right.starts_with(left) {
                return Err(ConfigError::invalid(
                    "managed_directories",
                    "overlapping_roots",
                    Some(format!("{} / {}", left.display(), right.display())),
                ));
            }
        }
    }
    Ok(())
}
