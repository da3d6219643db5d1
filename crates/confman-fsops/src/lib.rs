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
#![allow(clippy::module_name_repetitions)]

//! Filesystem-backed store of plugin configuration files.
//!
//! [`Mutator`] adds, deletes, and lists config files under the managed roots,
//! with every path passing through [`PathPolicy`] first.

pub mod decode;
pub mod envsubst;
pub mod error;
pub mod model;
pub mod mutator;
pub mod policy;
pub mod registry;

pub use decode::{Section, decode_sections, select_section};
pub use envsubst::EnvSubstituter;
pub use error::{ErrorKind, FsOpsError, FsOpsResult};
pub use model::{ConfigDescriptor, ListedConfig, MutationFailure, MutationOutcome, MutationResult};
pub use mutator::{CONFIG_EXTENSION, ConfigListing, FILE_PREFIX, Mutator};
pub use policy::PathPolicy;
pub use registry::{ConfigKind, DEFAULT_TICKER_INTERVAL, TickerRule};
