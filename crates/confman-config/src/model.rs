//! Typed configuration models.
//!
//! # Design
//! - `ManagerConfig` mirrors the on-disk document; every key is optional.
//! - `ManagerSettings` is the validated, fully-resolved view handed to services.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults::{
    DEFAULT_INCLUDE_TYPES, DEFAULT_SHARE_DIR, DEFAULT_TAG, FILE_POLLING_SUBDIR, HTTP_SUBDIR,
    LOGSTREAMER_SUBDIR, PROCESS_SUBDIR,
};
use crate::error::ConfigResult;
use crate::validate::{
    clean_path, validate_exclude_paths, validate_include_types, validate_roots, validate_tag,
};

/// Raw configuration document as read from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Constant tag attached to every outbound record.
    pub cm_tag: String,
    /// Path prefixes that are never listed or mutated.
    pub exclude_paths: Vec<PathBuf>,
    /// Recognised config type names; order is the listing priority.
    pub include_types: Vec<String>,
    /// Shared root used for managed directories left unset.
    pub share_dir: PathBuf,
    /// Root for ticker-interval process configs.
    pub process_dir: Option<PathBuf>,
    /// Root for log-stream configs.
    pub logstreamer_dir: Option<PathBuf>,
    /// Root for HTTP configs.
    pub http_dir: Option<PathBuf>,
    /// Root for file-polling configs.
    pub files_dir: Option<PathBuf>,
    /// Accepted for compatibility; has no observable effect.
    pub use_buffering: bool,
    /// Optional log format override (`json` or `pretty`).
    pub log_format: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            cm_tag: DEFAULT_TAG.to_string(),
            exclude_paths: Vec::new(),
            include_types: DEFAULT_INCLUDE_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            share_dir: PathBuf::from(DEFAULT_SHARE_DIR),
            process_dir: None,
            logstreamer_dir: None,
            http_dir: None,
            files_dir: None,
            use_buffering: true,
            log_format: None,
        }
    }
}

impl ManagerConfig {
    /// Fill unset directories from `share_dir`, clean every path, and validate.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::InvalidField`] when the tag is blank, the include list is
    /// empty or contains blanks/duplicates, an exclude entry is blank, or two managed roots
    /// nest inside each other.
    pub fn resolve(self) -> ConfigResult<ManagerSettings> {
        validate_tag(&self.cm_tag)?;
        validate_include_types(&self.include_types)?;
        validate_exclude_paths(&self.exclude_paths)?;

        let share_dir = self.share_dir;
        let pick = |explicit: Option<PathBuf>, subdir: &str| {
            explicit
                .filter(|path| !path.as_os_str().is_empty())
                .unwrap_or_else(|| share_dir.join(subdir))
        };
        let directories = ManagedDirectories::new(
            pick(self.process_dir, PROCESS_SUBDIR),
            pick(self.logstreamer_dir, LOGSTREAMER_SUBDIR),
            pick(self.http_dir, HTTP_SUBDIR),
            pick(self.files_dir, FILE_POLLING_SUBDIR),
        );
        validate_roots(&directories)?;

        Ok(ManagerSettings {
            tag: self.cm_tag,
            exclude_paths: self
                .exclude_paths
                .iter()
                .map(|path| clean_path(path))
                .collect(),
            include_types: self.include_types,
            directories,
            use_buffering: self.use_buffering,
            log_format: self.log_format,
        })
    }
}

/// Validated settings consumed by the filesystem and pipeline services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerSettings {
    /// Constant tag attached to every outbound record.
    pub tag: String,
    /// Cleaned exclude prefixes, in declared order.
    pub exclude_paths: Vec<PathBuf>,
    /// Recognised config type names in priority order.
    pub include_types: Vec<String>,
    /// The four managed roots.
    pub directories: ManagedDirectories,
    /// Accepted for compatibility; has no observable effect.
    pub use_buffering: bool,
    /// Optional log format override.
    pub log_format: Option<String>,
}

impl ManagerSettings {
    /// Whether `config_type` is in the allow-list.
    #[must_use]
    pub fn includes_type(&self, config_type: &str) -> bool {
        self.include_types.iter().any(|known| known == config_type)
    }
}

/// A top-level directory eligible for add, delete, and list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManagedRoot {
    /// Ticker-interval process configs, nested by ticker seconds.
    Process,
    /// Log-stream configs.
    Logstreamer,
    /// HTTP configs.
    Http,
    /// File-polling configs.
    FilePolling,
}

impl ManagedRoot {
    /// Every managed root in declaration order.
    pub const ALL: [Self; 4] = [Self::Process, Self::Logstreamer, Self::Http, Self::FilePolling];

    /// Stable identifier used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Logstreamer => "logstreamer",
            Self::Http => "http",
            Self::FilePolling => "file_polling",
        }
    }
}

impl fmt::Display for ManagedRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of managed roots, each stored as a cleaned path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedDirectories {
    process: PathBuf,
    logstreamer: PathBuf,
    http: PathBuf,
    file_polling: PathBuf,
}

impl ManagedDirectories {
    /// Bind the four roots, cleaning each path lexically.
    #[must_use]
    pub fn new(
        process: impl AsRef<Path>,
        logstreamer: impl AsRef<Path>,
        http: impl AsRef<Path>,
        file_polling: impl AsRef<Path>,
    ) -> Self {
        Self {
            process: clean_path(process.as_ref()),
            logstreamer: clean_path(logstreamer.as_ref()),
            http: clean_path(http.as_ref()),
            file_polling: clean_path(file_polling.as_ref()),
        }
    }

    /// Conventional layout beneath a shared root.
    #[must_use]
    pub fn under(share_dir: impl AsRef<Path>) -> Self {
        let share_dir = share_dir.as_ref();
        Self::new(
            share_dir.join(PROCESS_SUBDIR),
            share_dir.join(LOGSTREAMER_SUBDIR),
            share_dir.join(HTTP_SUBDIR),
            share_dir.join(FILE_POLLING_SUBDIR),
        )
    }

    /// Path bound to `root`.
    #[must_use]
    pub fn get(&self, root: ManagedRoot) -> &Path {
        match root {
            ManagedRoot::Process => &self.process,
            ManagedRoot::Logstreamer => &self.logstreamer,
            ManagedRoot::Http => &self.http,
            ManagedRoot::FilePolling => &self.file_polling,
        }
    }

    /// Iterate roots in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (ManagedRoot, &Path)> {
        ManagedRoot::ALL.into_iter().map(|root| (root, self.get(root)))
    }
}
