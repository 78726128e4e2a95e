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

//! Binary entrypoint for the seeder daemon: fetches blobs from the origin
//! registry on a cache miss, seeds them over BitTorrent, and serves their
//! metainfo to proxies over gRPC.

mod bootstrap;
mod error;
mod grpc;
mod pipeline;

use anyhow::Result;

/// Bootstraps the seeder daemon and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::run().await
}
