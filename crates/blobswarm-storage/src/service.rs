//! The filesystem storage shim.
//!
//! Deliberately thin: a directory-backed implementation of "write these
//! bytes", "read this file's size", "stream this file", "delete this file",
//! "list what's here". No archive extraction, permission management, or
//! cleanup-rule machinery — callers that need the blob's bytes read the
//! path directly.

use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{StorageError, StorageResult};
use crate::model::StorageLayout;

/// Directory-backed storage for materialized blobs and their torrents.
#[derive(Debug, Clone)]
pub struct Storage {
    layout: StorageLayout,
}

impl Storage {
    /// Open storage rooted at `root`, creating the `data/` and `torrents/`
    /// subdirectories if they do not already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let layout = StorageLayout::new(root);
        fs::create_dir_all(layout.data_dir())
            .await
            .map_err(|source| StorageError::io("create_data_dir", layout.data_dir(), source))?;
        fs::create_dir_all(layout.torrent_dir())
            .await
            .map_err(|source| {
                StorageError::io("create_torrent_dir", layout.torrent_dir(), source)
            })?;
        Ok(Self { layout })
    }

    /// The on-disk layout this storage operates over.
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Write `bytes` as the materialized payload for `blob_id`, replacing
    /// any existing payload. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub async fn put_data(&self, blob_id: &str, bytes: &[u8]) -> StorageResult<u64> {
        let path = self.layout.data_path(blob_id);
        let mut file = fs::File::create(&path)
            .await
            .map_err(|source| StorageError::io("put_data.create", &path, source))?;
        file.write_all(bytes)
            .await
            .map_err(|source| StorageError::io("put_data.write", &path, source))?;
        #[expect(
            clippy::cast_possible_truncation,
            reason = "blob sizes are bounded by the cache's own size budget"
        )]
        Ok(bytes.len() as u64)
    }

    /// Size in bytes of the materialized payload for `blob_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no payload is stored, or an IO
    /// error for any other failure.
    pub async fn stat_data(&self, blob_id: &str) -> StorageResult<u64> {
        let path = self.layout.data_path(blob_id);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound {
                    blob_id: blob_id.to_string(),
                })
            }
            Err(source) => Err(StorageError::io("stat_data", &path, source)),
        }
    }

    /// Read the full materialized payload for `blob_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no payload is stored, or an IO
    /// error for any other failure.
    pub async fn read_data(&self, blob_id: &str) -> StorageResult<Vec<u8>> {
        let path = self.layout.data_path(blob_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound {
                    blob_id: blob_id.to_string(),
                })
            }
            Err(source) => Err(StorageError::io("read_data", &path, source)),
        }
    }

    /// Absolute path to the materialized payload for `blob_id`, for callers
    /// that want to stream it themselves (the proxy's local file transport).
    #[must_use]
    pub fn data_path(&self, blob_id: &str) -> PathBuf {
        self.layout.data_path(blob_id)
    }

    /// Write published torrent metainfo bytes for `blob_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub async fn put_torrent(&self, blob_id: &str, metainfo: &[u8]) -> StorageResult<()> {
        let path = self.layout.torrent_path(blob_id);
        fs::write(&path, metainfo)
            .await
            .map_err(|source| StorageError::io("put_torrent", &path, source))
    }

    /// Read published torrent metainfo bytes for `blob_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no torrent has been published,
    /// or an IO error for any other failure.
    pub async fn read_torrent(&self, blob_id: &str) -> StorageResult<Vec<u8>> {
        let path = self.layout.torrent_path(blob_id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound {
                    blob_id: blob_id.to_string(),
                })
            }
            Err(source) => Err(StorageError::io("read_torrent", &path, source)),
        }
    }

    /// Delete both the payload and torrent files for `blob_id`, if present.
    /// Missing files are not an error — eviction may race a manual cleanup.
    ///
    /// # Errors
    ///
    /// Returns an error only for IO failures other than "not found".
    pub async fn delete(&self, blob_id: &str) -> StorageResult<()> {
        remove_if_present(self.layout.data_path(blob_id)).await?;
        remove_if_present(self.layout.torrent_path(blob_id)).await?;
        Ok(())
    }

    /// List blob ids with a materialized payload on disk, used to warm
    /// start the cache on process boot.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be read.
    pub async fn list_data_blob_ids(&self) -> StorageResult<Vec<String>> {
        let dir = self.layout.data_dir();
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|source| StorageError::io("list_data_blob_ids", &dir, source))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| StorageError::io("list_data_blob_ids", &dir, source))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(blob_id) = StorageLayout::blob_id_from_data_file_name(name) {
                    ids.push(blob_id.to_string());
                }
            }
        }
        Ok(ids)
    }
}

async fn remove_if_present(path: PathBuf) -> StorageResult<()> {
    match fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(StorageError::io("delete", path, source)),
    }
}
