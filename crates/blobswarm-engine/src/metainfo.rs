//! Bencoded torrent metainfo construction and the handful of fields the
//! core reads back out of it (total length, piece count).
//!
//! Piece length is fixed at 4 MiB for every torrent this workspace
//! publishes, matching the original seeder's `DefaultMetaInfoPieceLength`
//! (spec §4.2, §6). Single-file torrents only: a blob is always exactly one
//! file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::error::{EngineError, EngineResult};

/// Fixed piece length applied to every torrent this workspace creates.
pub const DEFAULT_PIECE_LENGTH: u32 = 4 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct RawInfo {
    name: String,
    #[serde(rename = "piece length")]
    piece_length: u32,
    #[serde(with = "serde_bytes")]
    pieces: Vec<u8>,
    length: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawMetainfo {
    info: RawInfo,
    announce: String,
    #[serde(rename = "announce-list")]
    announce_list: Vec<Vec<String>>,
}

/// Build the bencoded metainfo for a single-file torrent over the bytes at
/// `data_path`, with `DEFAULT_PIECE_LENGTH`-sized pieces and the supplied
/// announce-list.
///
/// # Errors
///
/// Returns [`EngineError::MetainfoBuild`] if the data file cannot be read or
/// the result cannot be bencoded.
pub async fn build_single_file_metainfo(
    blob_id: &str,
    data_path: &Path,
    trackers: &[String],
) -> EngineResult<Vec<u8>> {
    let mut file = tokio::fs::File::open(data_path).await.map_err(|err| {
        build_error(blob_id, format!("opening {}: {err}", data_path.display()))
    })?;

    let mut pieces = Vec::new();
    let mut total_length: u64 = 0;
    let mut buf = vec![0_u8; DEFAULT_PIECE_LENGTH as usize];
    loop {
        let read = read_piece(&mut file, &mut buf)
            .await
            .map_err(|err| build_error(blob_id, format!("reading {}: {err}", data_path.display())))?;
        if read == 0 {
            break;
        }
        total_length += read as u64;
        let digest = Sha1::digest(&buf[..read]);
        pieces.extend_from_slice(&digest);
        if read < buf.len() {
            break;
        }
    }

    let name = format!("{blob_id}.layer");
    let raw = RawMetainfo {
        info: RawInfo {
            name,
            piece_length: DEFAULT_PIECE_LENGTH,
            pieces,
            length: total_length,
        },
        announce: trackers.first().cloned().unwrap_or_default(),
        announce_list: trackers.iter().map(|t| vec![t.clone()]).collect(),
    };

    serde_bencode::to_bytes(&raw)
        .map_err(|err| build_error(blob_id, format!("bencoding metainfo: {err}")))
}

async fn read_piece(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read the total payload length (bytes) out of previously-built metainfo.
///
/// # Errors
///
/// Returns [`EngineError::MetainfoDecode`] if `metainfo` is not valid
/// bencode or is missing the `info.length` field this workspace always
/// writes for single-file torrents.
pub fn total_length(blob_id: &str, metainfo: &[u8]) -> EngineResult<u64> {
    let raw: RawMetainfo = serde_bencode::from_bytes(metainfo).map_err(|err| {
        EngineError::MetainfoDecode {
            blob_id: blob_id.to_string(),
            message: err.to_string(),
        }
    })?;
    Ok(raw.info.length)
}

fn build_error(blob_id: &str, message: String) -> EngineError {
    EngineError::MetainfoBuild {
        blob_id: blob_id.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_single_piece_metainfo_and_round_trips_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.layer");
        tokio::fs::write(&path, b"hello world").await.expect("write");

        let trackers = vec!["http://tracker.example/announce".to_string()];
        let metainfo = build_single_file_metainfo("a", &path, &trackers)
            .await
            .expect("build metainfo");

        assert_eq!(total_length("a", &metainfo).expect("length"), 11);
    }

    #[tokio::test]
    async fn multi_piece_file_hashes_each_piece() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("big.layer");
        let payload = vec![7_u8; (DEFAULT_PIECE_LENGTH as usize) + 1024];
        tokio::fs::write(&path, &payload).await.expect("write");

        let metainfo = build_single_file_metainfo("big", &path, &[])
            .await
            .expect("build metainfo");
        let raw: RawMetainfo = serde_bencode::from_bytes(&metainfo).expect("decode");
        assert_eq!(raw.info.pieces.len(), 20 * 2);
        assert_eq!(total_length("big", &metainfo).expect("length"), payload.len() as u64);
    }
}
