#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::multiple_crate_versions)]

//! Filesystem storage shim for materialized blob payloads and published
//! torrents.
//! Layout: `model/` (path derivation), `error.rs` (error types), `service.rs`
//! (directory-backed IO).

pub mod error;
pub mod model;
pub mod service;

pub use error::{StorageError, StorageResult};
pub use model::StorageLayout;
pub use service::Storage;
