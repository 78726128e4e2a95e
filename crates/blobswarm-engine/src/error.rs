//! Error types for the BT engine adapter.

use thiserror::Error;

/// Errors surfaced by [`crate::BtEngine`] and the [`crate::TorrentSession`] boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Building the bencoded torrent metainfo failed (disk I/O or bencode encoding).
    #[error("failed to build torrent metainfo for blob {blob_id}: {message}")]
    MetainfoBuild {
        /// Blob the metainfo was being built for.
        blob_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// The supplied metainfo bytes could not be decoded.
    #[error("failed to decode torrent metainfo for blob {blob_id}: {message}")]
    MetainfoDecode {
        /// Blob the metainfo was being decoded for.
        blob_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// The underlying session rejected the add/drop/query operation.
    #[error("BT session operation failed for blob {blob_id}: {message}")]
    Session {
        /// Blob the session operation concerned.
        blob_id: String,
        /// Human-readable detail.
        message: String,
    },
    /// `start_leecher` did not observe completion before its deadline.
    #[error("leeching blob {blob_id} exceeded the download deadline")]
    Timeout {
        /// Blob that timed out.
        blob_id: String,
    },
    /// Storage I/O failed while reading or writing the data/torrent files.
    #[error("storage operation failed for blob {blob_id}: {source}")]
    Storage {
        /// Blob the storage operation concerned.
        blob_id: String,
        /// Underlying storage error.
        #[source]
        source: blobswarm_storage::StorageError,
    },
}

/// Convenience alias for engine operation results.
pub type EngineResult<T> = Result<T, EngineError>;
