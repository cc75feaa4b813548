//! Blob storage for area photos.
//!
//! Uploaded bytes land in `<DATA_DIR>/blobs/<uuid>.jpg` and are served
//! back under the durable URL path `/blobs/<uuid>.jpg`. Nothing here
//! tracks which documents reference which blobs; a photo uploaded for a
//! draft that never submits is orphaned (a known, inherited gap).

use std::fs;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

/// Errors that can occur during blob operations.
#[derive(Debug)]
pub enum BlobStoreError {
    /// I/O error reading or writing a blob.
    IoError(PathBuf, io::Error),
    /// Invalid blob name (e.g., contains path separators).
    InvalidName(String),
    /// The requested blob does not exist.
    NotFound(String),
}

impl std::fmt::Display for BlobStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobStoreError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            BlobStoreError::InvalidName(name) => write!(f, "Invalid blob name: {}", name),
            BlobStoreError::NotFound(name) => write!(f, "Blob not found: {}", name),
        }
    }
}

impl std::error::Error for BlobStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobStoreError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// On-disk blob store.
#[derive(Debug, Clone)]
pub struct BlobStore {
    data_dir: PathBuf,
}

impl BlobStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn validate_name(name: &str) -> Result<(), BlobStoreError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.starts_with('.')
        {
            return Err(BlobStoreError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.blob_dir().join(name)
    }

    /// Stores uploaded bytes under a fresh name and returns the durable
    /// URL path.
    pub fn store(&self, bytes: &[u8]) -> Result<String, BlobStoreError> {
        let dir = self.blob_dir();
        fs::create_dir_all(&dir).map_err(|e| BlobStoreError::IoError(dir.clone(), e))?;

        let name = format!("{}.jpg", Uuid::new_v4());
        let path = self.blob_path(&name);
        fs::write(&path, bytes).map_err(|e| BlobStoreError::IoError(path, e))?;

        Ok(format!("/blobs/{name}"))
    }

    /// Reads a blob's bytes.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, BlobStoreError> {
        Self::validate_name(name)?;
        let path = self.blob_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(BlobStoreError::IoError(path, e)),
        }
    }

    /// Deletes a blob. Deleting a missing blob succeeds.
    pub fn delete(&self, name: &str) -> Result<(), BlobStoreError> {
        Self::validate_name(name)?;
        let path = self.blob_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobStoreError::IoError(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_and_read() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        let url = store.store(b"jpeg bytes").unwrap();
        assert!(url.starts_with("/blobs/"));
        assert!(url.ends_with(".jpg"));

        let name = url.strip_prefix("/blobs/").unwrap();
        assert_eq!(store.read(name).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn test_each_upload_gets_a_fresh_name() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        assert_ne!(store.store(b"a").unwrap(), store.store(b"a").unwrap());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());

        let url = store.store(b"bytes").unwrap();
        let name = url.strip_prefix("/blobs/").unwrap();
        store.delete(name).unwrap();
        store.delete(name).unwrap();
        assert!(matches!(
            store.read(name),
            Err(BlobStoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        for bad in ["", "../escape.jpg", "a/b.jpg", ".hidden"] {
            assert!(store.read(bad).is_err());
            assert!(store.delete(bad).is_err());
        }
    }
}
