//! # Design
//!
//! - Constant-message variants carrying the context needed to reproduce a failure.
//! - `report()` renders the per-request payload sent back to the host; messages never
//!   interpolate context into `Display`.
//! - `kind()` collapses variants into the coarse taxonomy used for status and metrics.

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for config store operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the config store.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// A request or config section failed validation.
    #[error("config validation failed")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Config text could not be decoded into sections.
    #[error("config decode failure")]
    Decode {
        /// Operation that triggered the decode.
        operation: &'static str,
        /// Top-level key that is not a section, when that is the failure.
        key: Option<String>,
        /// Underlying parser error.
        #[source]
        source: Option<toml::de::Error>,
    },
    /// A `%ENV[NAME]` token referenced an undefined variable.
    #[error("environment substitution failed")]
    EnvSubstitution {
        /// Variable that was not defined.
        variable: String,
    },
    /// The substitution pattern failed to compile.
    #[error("substitution pattern invalid")]
    Pattern {
        /// Pattern source.
        pattern: &'static str,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// An equivalent config already exists and overwrite was not requested.
    #[error("duplicate config")]
    DuplicateConfig {
        /// Path of the existing config.
        path: PathBuf,
        /// Contents of the existing config.
        contents: String,
    },
    /// The delete target does not exist.
    #[error("path not found")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },
    /// The path falls outside the managed roots or under an exclude prefix.
    #[error("path safety violation")]
    SafetyViolation {
        /// Offending path (cleaned).
        path: PathBuf,
        /// Exclude prefix that matched, if exclusion was the cause.
        excluded_by: Option<PathBuf>,
    },
    /// A directory that may not be deleted.
    #[error("directory deletion forbidden")]
    Forbidden {
        /// Directory that was targeted.
        path: PathBuf,
    },
    /// IO failures while interacting with the filesystem.
    #[error("config store io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failures while listing.
    #[error("config store walk failure")]
    Walk {
        /// Operation that triggered the walk failure.
        operation: &'static str,
        /// Path involved in the walk failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
}

/// Coarse error taxonomy reported to the host and recorded in metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid field.
    Validation,
    /// Duplicate config, write skipped.
    DuplicateConfig,
    /// Stat, open, read, write, or remove failure.
    Filesystem,
    /// Exclude match, path outside the managed roots, or unsafe directory deletion.
    SafetyViolation,
    /// Malformed config text.
    Decode,
}

impl ErrorKind {
    /// Stable label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::DuplicateConfig => "duplicate_config",
            Self::Filesystem => "filesystem",
            Self::SafetyViolation => "safety_violation",
            Self::Decode => "decode",
        }
    }
}

impl FsOpsError {
    pub(crate) const fn validation(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::Validation {
            field,
            reason,
            value,
        }
    }

    pub(crate) const fn decode(operation: &'static str, source: toml::de::Error) -> Self {
        Self::Decode {
            operation,
            key: None,
            source: Some(source),
        }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walk(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walk {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Taxonomy bucket for this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::Pattern { .. } => ErrorKind::Validation,
            Self::Decode { .. } | Self::EnvSubstitution { .. } => ErrorKind::Decode,
            Self::DuplicateConfig { .. } => ErrorKind::DuplicateConfig,
            Self::SafetyViolation { .. } | Self::Forbidden { .. } => ErrorKind::SafetyViolation,
            Self::NotFound { .. } | Self::Io { .. } | Self::Walk { .. } => ErrorKind::Filesystem,
        }
    }

    /// Human-readable payload describing the failure to the host.
    #[must_use]
    pub fn report(&self) -> String {
        match self {
            Self::Validation {
                field: "config_type",
                reason: "unknown_root",
                ..
            } => "Unable to determine configuration directory.".to_string(),
            Self::Validation {
                field: "payload",
                reason: "no_eligible_section",
                ..
            } => "No configuration section with an included type was found.".to_string(),
            Self::Validation {
                field,
                reason,
                value,
            } => {
                let mut message = format!("Invalid '{field}': {reason}");
                if let Some(value) = value {
                    let _ = write!(message, " ({value})");
                }
                message
            }
            Self::Decode {
                key: Some(key), ..
            } => format!("Error decoding config file: top-level key '{key}' is not a section"),
            Self::Decode {
                source: Some(source),
                ..
            } => format!("Error decoding config file: {source}"),
            Self::Decode { .. } => "Error decoding config file: contents are not UTF-8".to_string(),
            Self::EnvSubstitution { variable } => {
                format!("Environment variable '{variable}' is not defined")
            }
            Self::Pattern { source, .. } => format!("Invalid substitution pattern: {source}"),
            Self::DuplicateConfig { path, contents } => format!(
                "Duplicate config already exists for this interval and overwrite is disabled.\nNot adding configuration.\nFilename: {}\n{contents}",
                path.display()
            ),
            Self::NotFound { path } => {
                format!("can't stat file: {}: no such file or directory", path.display())
            }
            Self::SafetyViolation {
                path,
                excluded_by: Some(prefix),
            } => format!(
                "'{}' is under exclude_paths '{}'. Skipping.",
                path.display(),
                prefix.display()
            ),
            Self::SafetyViolation { path, .. } => {
                format!("'{}' is not under any managed directory", path.display())
            }
            Self::Forbidden { path } => {
                format!("You cannot delete this directory: {}", path.display())
            }
            Self::Io { path, source, .. } => {
                format!("Failed due to error: {}: {source}", path.display())
            }
            Self::Walk { path, source, .. } => {
                format!("Failed walking {}: {source}", path.display())
            }
        }
    }
}
