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

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (managed tree on disk), payloads.rs (sample config text), mocks.rs (recording sink).

pub mod fixtures;
pub mod mocks;
pub mod payloads;
