//! On-disk store for uploaded dataset files
//!
//! Files are written under `<root>/data/<uuid>.<ext>`; the database keeps the
//! relative path so the root can move without touching stored rows.

use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::domain::FileType;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored file is missing: {0}")]
    Missing(String),

    #[error("Refusing path outside the storage root: {0}")]
    InvalidPath(String),
}

/// A file written by [`FileStore::save`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub id: Uuid,
    /// Path relative to the storage root
    pub uri: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

const DATA_SUBDIR: &str = "data";

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if it does not exist yet
    pub async fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StorageError::Io {
                path: self.root.clone(),
                source,
            })
    }

    fn resolve(&self, uri: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(uri);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(uri.to_string()));
        }
        Ok(self.root.join(rel))
    }

    /// Write `bytes` under a fresh UUID name with the extension of `file_type`
    pub async fn save(
        &self,
        bytes: &[u8],
        file_type: FileType,
    ) -> Result<StoredFile, StorageError> {
        let id = Uuid::new_v4();
        let uri = format!("{DATA_SUBDIR}/{id}.{}", file_type.extension());
        let path = self.resolve(&uri)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, bytes).await.map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;

        debug!(%id, path = %path.display(), size = bytes.len(), "stored upload");
        Ok(StoredFile {
            id,
            uri,
            size: bytes.len() as u64,
        })
    }

    pub async fn read(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(uri)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::Missing(uri.to_string()))
            }
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Delete a stored file; a file that is already gone is not an error
    pub async fn remove(&self, uri: &str) -> Result<(), StorageError> {
        let path = self.resolve(uri)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed stored file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
