//! Generated gRPC client/server code for the `MetaInfo` service (spec §6):
//! `GetMetaInfo(url) -> metainfo`, called by a proxy against a seeder on
//! every cache miss.

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

tonic::include_proto!("blobswarm.metainfo.v1");
