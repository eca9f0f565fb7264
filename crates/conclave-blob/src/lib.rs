//! Content-addressed binary store (C1).
//!
//! Blobs are stored as files under `<data_dir>/blobs/<hex-hash>`, named by
//! the SHA-512/256 digest of their content. Writes are idempotent: storing
//! the same bytes twice is a no-op on the second call.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha512_256};
use tracing::instrument;

use conclave_core::ConclaveError;

#[derive(Clone)]
pub struct BlobStore {
    base_dir: PathBuf,
}

impl BlobStore {
    pub fn new(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_dir = data_dir.as_ref().join("blobs");
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Hash of `bytes`, formatted as lowercase hex.
    pub fn hash_of(bytes: &[u8]) -> String {
        let mut hasher = Sha512_256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        self.base_dir.join(hash)
    }

    /// Store `bytes`, returning their content hash. Idempotent.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn put(&self, bytes: &[u8]) -> Result<String, ConclaveError> {
        let hash = Self::hash_of(bytes);
        let path = self.path_for(&hash);
        if !path.exists() {
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, bytes)?;
            std::fs::rename(&tmp, &path)?;
        }
        Ok(hash)
    }

    #[instrument(skip(self))]
    pub fn get(&self, hash: &str) -> Result<Vec<u8>, ConclaveError> {
        let path = self.path_for(hash);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConclaveError::BlobNotFound(hash.to_string())
            } else {
                ConclaveError::Io(e)
            }
        })
    }

    pub fn exists(&self, hash: &str) -> bool {
        self.path_for(hash).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_is_idempotent_and_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();
        let hash1 = store.put(b"hello world").unwrap();
        let hash2 = store.put(b"hello world").unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(store.get(&hash1).unwrap(), b"hello world");
    }

    #[test]
    fn unknown_hash_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();
        let err = store.get("deadbeef").unwrap_err();
        assert_eq!(err.code(), "blob-not-found");
    }

    #[test]
    fn exists_reflects_presence() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path()).unwrap();
        let hash = store.put(b"x").unwrap();
        assert!(store.exists(&hash));
        assert!(!store.exists("0000"));
    }
}
