//! Local filesystem helpers used when staging remote objects to disk.

use std::{fmt::Debug, path::Path};

use sha2::{Digest, Sha256};
use tokio::fs::File;

use crate::{StorageError, StorageResult};

/// Returns true only if `path` exists and is a regular file.
///
/// Missing paths, directories and stat errors all report false.
pub fn file_exists(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

/// Create `path` for writing, creating its parent directories first.
///
/// An existing file is truncated.
pub async fn create(path: impl AsRef<Path>) -> StorageResult<File> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::local_io(parent, e))?;
    }
    File::create(path)
        .await
        .map_err(|e| StorageError::local_io(path, e))
}

/// Remove every child of `dir`, then `dir` itself.
pub async fn remove_dir(dir: impl AsRef<Path>) -> StorageResult<()> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| StorageError::local_io(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::local_io(dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| StorageError::local_io(&path, e))?;
        let removed = if file_type.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        removed.map_err(|e| StorageError::local_io(&path, e))?;
    }

    // Fails if something was written into the directory meanwhile.
    tokio::fs::remove_dir(dir)
        .await
        .map_err(|e| StorageError::local_io(dir, e))
}

/// Hex SHA-256 of the value's debug representation.
///
/// Used as a stable identifier, not for anything security sensitive.
pub fn as_sha256<T: Debug + ?Sized>(value: &T) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{value:?}").as_bytes());
    hex::encode(hasher.finalize())
}
