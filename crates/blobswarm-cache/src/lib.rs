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
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Single-flight, size-bounded LRU cache shared by the seeder's producer
//! pipeline and the proxy's leecher pipeline.
//!
//! At most one producer runs per blob id at a time; concurrent callers for
//! the same id wait on the in-flight entry instead of triggering duplicate
//! work. Eviction only ever considers completed entries, so an in-flight
//! producer can never be evicted out from under itself.

pub mod error;
pub mod model;
pub mod service;

pub use error::{CacheError, CacheResult};
pub use model::{BlobId, CacheEntry, CacheEntrySnapshot};
pub use service::{EvictHook, SingleFlightCache};
