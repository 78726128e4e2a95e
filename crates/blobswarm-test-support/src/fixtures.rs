//! Reusable fixtures for cache, engine, and storage integration tests.

use blobswarm_storage::Storage;
use tempfile::TempDir;

/// A [`Storage`] instance rooted in a freshly created temporary directory.
/// The `TempDir` is kept alive alongside the storage handle; dropping
/// `TempRootStorage` removes the directory tree.
pub struct TempRootStorage {
    /// Open storage handle rooted at `root`.
    pub storage: Storage,
    root: TempDir,
}

impl TempRootStorage {
    /// Create a new temporary root and open storage over it.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created or storage
    /// cannot be opened, which only happens if the host filesystem is
    /// unwritable.
    pub async fn new() -> Self {
        let root = TempDir::new().expect("create temporary storage root");
        let storage = Storage::open(root.path())
            .await
            .expect("open storage at temporary root");
        Self { storage, root }
    }

    /// The temporary root directory backing this storage.
    #[must_use]
    pub fn root_path(&self) -> &std::path::Path {
        self.root.path()
    }
}

/// Deterministic pseudo-random payload of `len` bytes, useful for exercising
/// multi-piece metainfo construction without pulling in a real blob.
#[must_use]
pub fn sample_payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}
