#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub, unused)]

//! File-backed configuration for the config manager.
//!
//! Layout: `model.rs` (typed settings and managed roots), `validate.rs`
//! (path cleaning and validation helpers), `loader.rs` (TOML/env loading),
//! `defaults.rs` (baseline values).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::{DEFAULT_INCLUDE_TYPES, DEFAULT_SHARE_DIR, DEFAULT_TAG};
pub use error::{ConfigError, ConfigResult};
pub use loader::{CONFIG_PATH_ENV, ConfigLoader, ConfigSource, SHARE_DIR_ENV};
pub use model::{ManagedDirectories, ManagedRoot, ManagerConfig, ManagerSettings};
pub use validate::clean_path;
