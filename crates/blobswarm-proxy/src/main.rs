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

//! Binary entrypoint for the proxy daemon: transparently accelerates
//! container-image blob pulls through a BitTorrent swarm, falling back to
//! the origin registry whenever the swarm path is ineligible or fails.

mod bootstrap;
mod error;
mod eligibility;
mod grpc_client;
mod handler;
mod pipeline;

use anyhow::Result;

/// Bootstraps the proxy daemon and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::run().await
}
