//! File-backed store for the reference sync server.
//!
//! ```text
//! <DATA_DIR>/
//!   collections/
//!     <collection_id>.json
//!   images/
//!     <image_id>.jpg
//! ```
//!
//! Writes go to a temp file and are renamed into place, so readers never see a
//! partially written snapshot.

use recipebox_core::CollectionSnapshot;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A stored snapshot could not be parsed or serialized.
    JsonError(PathBuf, serde_json::Error),
    /// Invalid file name (e.g., contains path separators).
    InvalidName(String),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::JsonError(path, e) => {
                write!(f, "Invalid snapshot {}: {}", path.display(), e)
            }
            ServerStorageError::InvalidName(name) => {
                write!(f, "Invalid name: {}", name)
            }
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::IoError(_, e) => Some(e),
            ServerStorageError::JsonError(_, e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerStorage {
    data_dir: PathBuf,
}

impl ServerStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn collections_dir(&self) -> PathBuf {
        self.data_dir.join("collections")
    }

    fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    fn collection_path(&self, id: Uuid) -> PathBuf {
        self.collections_dir().join(format!("{}.json", id))
    }

    /// Validates an image name to prevent path traversal attacks.
    fn validate_name(name: &str) -> Result<(), ServerStorageError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.starts_with('.')
        {
            return Err(ServerStorageError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Loads a collection snapshot. Returns `Ok(None)` if it was never pushed.
    pub fn load_collection(&self, id: Uuid) -> Result<Option<CollectionSnapshot>, ServerStorageError> {
        let path = self.collection_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ServerStorageError::IoError(path, e)),
        };
        let snapshot =
            serde_json::from_slice(&bytes).map_err(|e| ServerStorageError::JsonError(path, e))?;
        Ok(Some(snapshot))
    }

    /// Stores a collection snapshot, replacing any previous one.
    pub fn save_collection(&self, snapshot: &CollectionSnapshot) -> Result<(), ServerStorageError> {
        let path = self.collection_path(snapshot.id);
        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| ServerStorageError::JsonError(path.clone(), e))?;
        write_atomic(&path, &bytes)
    }

    /// Deletes a collection. Returns false if there was nothing to delete.
    pub fn delete_collection(&self, id: Uuid) -> Result<bool, ServerStorageError> {
        let path = self.collection_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ServerStorageError::IoError(path, e)),
        }
    }

    /// Stores uploaded image bytes under a fresh name and returns the name.
    pub fn save_image(&self, bytes: &[u8]) -> Result<String, ServerStorageError> {
        let name = format!("{}.jpg", Uuid::new_v4());
        write_atomic(&self.images_dir().join(&name), bytes)?;
        Ok(name)
    }

    pub fn load_image(&self, name: &str) -> Result<Option<Vec<u8>>, ServerStorageError> {
        Self::validate_name(name)?;
        let path = self.images_dir().join(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServerStorageError::IoError(path, e)),
        }
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ServerStorageError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| ServerStorageError::IoError(dir.to_path_buf(), e))?;
    }

    // Unique temp name so concurrent writers of one file never share it
    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    fs::write(&temp_path, bytes).map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        ServerStorageError::IoError(path.to_path_buf(), e)
    })
}
