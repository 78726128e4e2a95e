//! Domain types for the filesystem storage shim.
//!
//! # Design
//! - Keep path derivation centralized so the on-disk layout lives in one
//!   place: `<root>/data/<blob_id>.layer` and `<root>/torrents/<blob_id>.torrent`.

use std::path::{Path, PathBuf};

const DATA_DIR: &str = "data";
const TORRENT_DIR: &str = "torrents";
const DATA_EXTENSION: &str = "layer";
const TORRENT_EXTENSION: &str = "torrent";

/// Derives the on-disk layout rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Build a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory this layout was constructed with.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding materialized blob payloads.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    /// Directory holding published `.torrent` metainfo files.
    #[must_use]
    pub fn torrent_dir(&self) -> PathBuf {
        self.root.join(TORRENT_DIR)
    }

    /// Path to the materialized payload for `blob_id`.
    #[must_use]
    pub fn data_path(&self, blob_id: &str) -> PathBuf {
        self.data_dir().join(format!("{blob_id}.{DATA_EXTENSION}"))
    }

    /// Path to the published torrent metainfo for `blob_id`.
    #[must_use]
    pub fn torrent_path(&self, blob_id: &str) -> PathBuf {
        self.torrent_dir()
            .join(format!("{blob_id}.{TORRENT_EXTENSION}"))
    }

    /// Recover a blob id from a data file name, the inverse of `data_path`.
    #[must_use]
    pub fn blob_id_from_data_file_name(name: &str) -> Option<&str> {
        name.strip_suffix(&format!(".{DATA_EXTENSION}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_rooted_and_namespaced() {
        let layout = StorageLayout::new("/var/blobswarm");
        assert_eq!(
            layout.data_path("abcd"),
            PathBuf::from("/var/blobswarm/data/abcd.layer")
        );
        assert_eq!(
            layout.torrent_path("abcd"),
            PathBuf::from("/var/blobswarm/torrents/abcd.torrent")
        );
    }

    #[test]
    fn blob_id_recovered_from_data_file_name() {
        assert_eq!(
            StorageLayout::blob_id_from_data_file_name("abcd.layer"),
            Some("abcd")
        );
        assert_eq!(StorageLayout::blob_id_from_data_file_name("abcd.torrent"), None);
    }
}
