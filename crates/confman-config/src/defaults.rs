//! Baseline values applied when the configuration file omits a key.
//!
//! # Design
//! - Keep the conventional directory names next to the share root default.
//! - The include list order is the listing priority order.

/// Tag attached to every outbound record when none is configured.
pub const DEFAULT_TAG: &str = "CM";
/// Shared root used to derive managed directories that are not set explicitly.
pub const DEFAULT_SHARE_DIR: &str = "/usr/share/confman";
/// Recognised config types, in listing priority order.
pub const DEFAULT_INCLUDE_TYPES: &[&str] = &[
    "ProcessInput",
    "LogstreamerInput",
    "HttpInput",
    "FilePollingInput",
];

pub(crate) const PROCESS_SUBDIR: &str = "processes.d";
pub(crate) const LOGSTREAMER_SUBDIR: &str = "logstreamers.d";
pub(crate) const HTTP_SUBDIR: &str = "http.d";
pub(crate) const FILE_POLLING_SUBDIR: &str = "files.d";
