//! Values produced by store operations.
//!
//! # Design
//! - A descriptor is built fresh for every request or listed file and returned by value.
//! - Failures carry the descriptor as it stood when the operation stopped.

use std::path::{Path, PathBuf};

use confman_events::Status;

use crate::decode::Section;
use crate::error::FsOpsError;
use crate::registry::{self, ConfigKind};

/// Identity of the config an operation touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDescriptor {
    /// Logical section name.
    pub name: String,
    /// Declared plugin type.
    pub config_type: String,
    /// Plugin category.
    pub category: String,
    /// Ticker seconds, set only for interval-driven kinds.
    pub ticker: Option<u32>,
    /// File the operation resolved to.
    pub file_name: Option<PathBuf>,
    /// Whether overwrite was requested.
    pub overwrite: bool,
    /// Outcome of the operation.
    pub status: Status,
}

impl ConfigDescriptor {
    /// Descriptor naming only a file.
    #[must_use]
    pub fn for_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: Some(path.into()),
            ..Self::default()
        }
    }

    /// Copy name, type, and category from a decoded section.
    pub fn describe_section(&mut self, section: &Section) {
        section.name().clone_into(&mut self.name);
        section.config_type().clone_into(&mut self.config_type);
        section.category().clone_into(&mut self.category);
    }

    /// Copy type and category from a registered kind.
    pub fn describe_kind(&mut self, kind: &ConfigKind) {
        kind.type_name.clone_into(&mut self.config_type);
        kind.category.clone_into(&mut self.category);
    }

    /// Whether the declared type is interval-driven.
    #[must_use]
    pub fn is_interval_driven(&self) -> bool {
        registry::lookup(&self.config_type).is_some_and(|kind| kind.ticker.is_interval())
    }

    /// File name rendered for the host; empty when unset.
    #[must_use]
    pub fn file_name_display(&self) -> String {
        self.file_name
            .as_deref()
            .map(Path::display)
            .map(|display| display.to_string())
            .unwrap_or_default()
    }
}

/// Successful add or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Final descriptor; status may be `Error` on partial success.
    pub descriptor: ConfigDescriptor,
    /// Human-readable result.
    pub message: String,
}

/// Failed add or delete.
#[derive(Debug, thiserror::Error)]
#[error("config mutation failed")]
pub struct MutationFailure {
    /// Descriptor as it stood when the operation stopped; status is `Error`.
    pub descriptor: ConfigDescriptor,
    /// Cause.
    #[source]
    pub error: FsOpsError,
}

impl MutationFailure {
    /// Payload reported to the host.
    #[must_use]
    pub fn report(&self) -> String {
        self.error.report()
    }
}

/// Result of an add or delete.
pub type MutationResult = Result<MutationOutcome, Box<MutationFailure>>;

/// One file surfaced by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedConfig {
    /// Descriptor derived from the file.
    pub descriptor: ConfigDescriptor,
    /// Literal file bytes.
    pub payload: Vec<u8>,
}
