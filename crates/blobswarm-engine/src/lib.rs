#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! The BT engine adapter: binds a `BlobId` to at most one torrent handle in
//! an opaque BitTorrent session, and owns the background "wait for info,
//! then download" task for every torrent it adds.
//!
//! Layout: `session` (the opaque engine boundary — a `stub` double used by
//! default and in every test, and an optional `native` backend behind the
//! `native` feature), `metainfo` (bencode torrent-file construction, piece
//! length fixed at 4 MiB), `adapter` (`BtEngine`, the public seam consumed
//! by both pipelines), `error`.

pub mod adapter;
pub mod error;
pub mod metainfo;
pub mod session;

pub use adapter::BtEngine;
pub use error::{EngineError, EngineResult};
pub use metainfo::DEFAULT_PIECE_LENGTH;
pub use session::stub::StubSession;
pub use session::{SessionHandle, TorrentSession};
